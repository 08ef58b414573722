// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for wrapped computations: hits, misses, eviction, invalidation and
//! the offline fallback.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use ohno::ErrorExt;
use rcache::{Cache, CachedFn, CallArgs, Error, JsonCodec};
use rcache_store::{
    AtomicWrite, Store,
    testing::{MockStore, StoreOp},
};
use tick::ClockControl;

const TRACKING: &str = "rc:squares:keys";

type Computation = BoxFuture<'static, Result<i64, Error>>;

#[derive(Clone, Debug, Default)]
struct Runs(Arc<AtomicUsize>);

impl Runs {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

fn setup() -> (ClockControl, MockStore, Cache<MockStore>) {
    let control = ClockControl::new_at(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));
    let store = MockStore::new(control.to_clock());
    let cache = Cache::builder(store.clone(), control.to_clock()).build();
    (control, store, cache)
}

fn squares(
    cache: &Cache<MockStore>,
    runs: &Runs,
    limit: u64,
) -> CachedFn<MockStore, JsonCodec, impl Fn(CallArgs) -> Computation + Send + Sync + use<>> {
    let runs = runs.clone();
    cache
        .entry()
        .namespace("squares")
        .limit(limit)
        .wrap(move |args: CallArgs| -> Computation {
            let runs = runs.clone();
            Box::pin(async move {
                runs.bump();
                let n: i64 = args.parse(0)?;
                Ok::<_, Error>(n * n)
            })
        })
}

fn key(n: i64) -> String {
    format!("rc:squares:[[{n}],{{}}]")
}

#[tokio::test]
async fn miss_then_hit_runs_computation_once() {
    let (_control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 0);

    assert_eq!(entry.call(CallArgs::new().arg(3)).await.unwrap(), 9);
    assert_eq!(entry.call(CallArgs::new().arg(3)).await.unwrap(), 9);
    assert_eq!(runs.count(), 1);

    let ops = store.operations();
    assert_eq!(ops.len(), 3, "unexpected operations {ops:?}");
    assert_eq!(ops[0], StoreOp::Get(key(3)));
    assert!(matches!(&ops[1], StoreOp::Write(write) if write.key() == key(3) && write.value() == b"9"));
    assert_eq!(ops[2], StoreOp::Get(key(3)));
}

#[tokio::test]
async fn keyword_order_does_not_change_the_key() {
    let (_control, _store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 0);

    let first = CallArgs::new().arg(4).kwarg("unit", "m").kwarg("scale", 1);
    let second = CallArgs::new().arg(4).kwarg("scale", 1).kwarg("unit", "m");
    assert_eq!(entry.key(&first).unwrap(), entry.key(&second).unwrap());

    entry.call(first).await.unwrap();
    entry.call(second).await.unwrap();
    assert_eq!(runs.count(), 1);
}

#[tokio::test]
async fn distinct_arguments_are_cached_separately() {
    let (_control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 0);

    assert_eq!(entry.call(CallArgs::new().arg(2)).await.unwrap(), 4);
    assert_eq!(entry.call(CallArgs::new().arg(5)).await.unwrap(), 25);
    assert_eq!(runs.count(), 2);
    assert_eq!(store.inner().len(), 2);
}

#[tokio::test]
async fn limit_evicts_least_recently_written() {
    let (control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 2);

    for n in 1..=3 {
        entry.call(CallArgs::new().arg(n)).await.unwrap();
        control.advance(Duration::from_millis(1));
    }

    assert_eq!(store.inner().tracked(TRACKING), Some(vec![key(2), key(3)]));
    assert!(!store.inner().contains_key(&key(1)));
    assert!(store.inner().contains_key(&key(2)));
    assert!(store.inner().contains_key(&key(3)));

    entry.call(CallArgs::new().arg(1)).await.unwrap();
    assert_eq!(runs.count(), 4, "evicted result should be recomputed");
}

#[tokio::test]
async fn tracked_writes_carry_limit_and_tracking_key() {
    let (_control, store, cache) = setup();
    let entry = squares(&cache, &Runs::default(), 5);

    entry.call(CallArgs::new().arg(1)).await.unwrap();

    let write = store
        .operations()
        .into_iter()
        .find_map(|op| match op {
            StoreOp::Write(write) => Some(write),
            _ => None,
        })
        .expect("a write should have been issued");
    assert_eq!(write.tracking_key(), TRACKING);
    assert_eq!(write.limit(), 5);
    assert!(write.is_tracked());
}

#[tokio::test]
async fn untracked_entries_never_create_a_tracking_set() {
    let (_control, store, cache) = setup();
    let entry = squares(&cache, &Runs::default(), 0);

    for n in 0..5 {
        entry.call(CallArgs::new().arg(n)).await.unwrap();
    }

    assert_eq!(store.inner().tracked(TRACKING), None);
    assert_eq!(store.inner().len(), 5);
}

#[tokio::test]
async fn ttl_expires_stored_results() {
    let (control, store, cache) = setup();
    let runs = Runs::default();
    let task_runs = runs.clone();
    let entry = cache
        .entry()
        .namespace("squares")
        .ttl(Duration::from_secs(60))
        .wrap(move |args: CallArgs| -> Computation {
            let runs = task_runs.clone();
            Box::pin(async move {
                runs.bump();
                Ok::<_, Error>(args.parse::<i64>(0)?.pow(2))
            })
        });

    entry.call(CallArgs::new().arg(7)).await.unwrap();
    assert_eq!(store.inner().expires_in(&key(7)), Some(Duration::from_secs(60)));

    control.advance(Duration::from_secs(30));
    entry.call(CallArgs::new().arg(7)).await.unwrap();
    assert_eq!(runs.count(), 1);

    control.advance(Duration::from_secs(31));
    entry.call(CallArgs::new().arg(7)).await.unwrap();
    assert_eq!(runs.count(), 2, "expired result should be recomputed");
}

#[tokio::test]
async fn results_without_ttl_do_not_expire() {
    let (control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 0);

    entry.call(CallArgs::new().arg(7)).await.unwrap();
    assert_eq!(store.inner().expires_in(&key(7)), None);

    control.advance(Duration::from_secs(86_400));
    entry.call(CallArgs::new().arg(7)).await.unwrap();
    assert_eq!(runs.count(), 1);
}

#[tokio::test]
async fn empty_stored_value_counts_as_a_miss() {
    let (_control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 0);

    store.inner().write(&AtomicWrite::new(key(6), TRACKING, Vec::new())).await.unwrap();

    assert_eq!(entry.call(CallArgs::new().arg(6)).await.unwrap(), 36);
    assert_eq!(runs.count(), 1);
    assert_eq!(store.inner().get(&key(6)).await.unwrap(), Some(b"36".to_vec()));
}

#[tokio::test]
async fn invalidate_forces_recomputation() {
    let (_control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 10);

    entry.call(CallArgs::new().arg(8)).await.unwrap();
    entry.invalidate(&CallArgs::new().arg(8)).await.unwrap();

    assert!(!store.inner().contains_key(&key(8)));
    assert_eq!(store.inner().tracked(TRACKING), None, "untracked set should be gone");

    entry.call(CallArgs::new().arg(8)).await.unwrap();
    assert_eq!(runs.count(), 2);
}

#[tokio::test]
async fn invalidate_untracks_only_when_limited() {
    let (_control, store, cache) = setup();
    let limited = squares(&cache, &Runs::default(), 3);
    let unlimited = cache
        .entry()
        .namespace("plain")
        .wrap(|args: CallArgs| async move { args.parse::<i64>(0) });

    limited.invalidate(&CallArgs::new().arg(1)).await.unwrap();
    unlimited.invalidate(&CallArgs::new().arg(1)).await.unwrap();

    assert_eq!(
        store.operations(),
        vec![
            StoreOp::Remove {
                key: key(1),
                tracking_key: Some(TRACKING.to_string()),
            },
            StoreOp::Remove {
                key: "rc:plain:[[1],{}]".to_string(),
                tracking_key: None,
            },
        ]
    );
}

#[tokio::test]
async fn invalidate_missing_key_succeeds() {
    let (_control, _store, cache) = setup();
    let entry = squares(&cache, &Runs::default(), 3);

    entry.invalidate(&CallArgs::new().arg(404)).await.unwrap();
}

#[tokio::test]
async fn invalidate_all_clears_the_namespace() {
    let (control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 10);
    let other = cache
        .entry()
        .namespace("other")
        .limit(10)
        .wrap(|args: CallArgs| async move { args.parse::<i64>(0) });

    for n in 1..=2 {
        entry.call(CallArgs::new().arg(n)).await.unwrap();
        control.advance(Duration::from_millis(1));
    }
    other.call(CallArgs::new().arg(1)).await.unwrap();
    store.clear_operations();

    entry.invalidate_all().await.unwrap();

    assert_eq!(
        store.operations(),
        vec![
            StoreOp::TrackedKeys(TRACKING.to_string()),
            StoreOp::Delete(vec![key(1), key(2), TRACKING.to_string()]),
        ]
    );
    assert!(!store.inner().contains_key(&key(1)));
    assert!(!store.inner().contains_key(&key(2)));
    assert_eq!(store.inner().tracked(TRACKING), None);

    assert!(store.inner().contains_key("rc:other:[[1],{}]"), "other namespaces are untouched");
    assert!(store.inner().tracked("rc:other:keys").is_some());

    entry.call(CallArgs::new().arg(1)).await.unwrap();
    assert_eq!(runs.count(), 3);
}

#[tokio::test]
async fn invalidate_all_on_untracked_entry_does_nothing() {
    let (_control, store, cache) = setup();
    let entry = squares(&cache, &Runs::default(), 0);

    entry.call(CallArgs::new().arg(1)).await.unwrap();
    store.clear_operations();

    entry.invalidate_all().await.unwrap();
    assert_eq!(store.round_trips(), 0);
    assert!(store.inner().contains_key(&key(1)));
}

#[tokio::test]
async fn unreachable_store_switches_entry_offline() {
    let (_control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 10);

    store.fail_when(|op| matches!(op, StoreOp::Get(_)));
    assert_eq!(entry.call(CallArgs::new().arg(3)).await.unwrap(), 9);
    assert!(entry.is_offline());
    assert_eq!(store.operations(), vec![StoreOp::Get(key(3))]);

    // The store recovers, but the entry stays offline.
    store.clear_failures();
    store.clear_operations();

    assert_eq!(entry.call(CallArgs::new().arg(3)).await.unwrap(), 9);
    assert_eq!(entry.call(CallArgs::new().arg(3)).await.unwrap(), 9);

    assert_eq!(runs.count(), 3);
    assert_eq!(store.round_trips(), 0, "offline calls must not touch the store");
}

#[tokio::test]
async fn offline_entries_still_invalidate_through_the_store() {
    let (_control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 10);

    entry.call(CallArgs::new().arg(1)).await.unwrap();
    entry.call(CallArgs::new().arg(2)).await.unwrap();

    store.fail_when(|op| matches!(op, StoreOp::Get(_)));
    entry.call(CallArgs::new().arg(1)).await.unwrap();
    assert!(entry.is_offline());
    store.clear_failures();

    entry.invalidate(&CallArgs::new().arg(1)).await.unwrap();
    assert!(!store.inner().contains_key(&key(1)), "stale value must not stay visible to other callers");
    assert_eq!(store.inner().tracked(TRACKING), Some(vec![key(2)]));

    entry.invalidate_all().await.unwrap();
    assert!(!store.inner().contains_key(&key(2)));
    assert_eq!(store.inner().tracked(TRACKING), None);
}

#[tokio::test]
async fn offline_invalidation_failures_propagate() {
    let (_control, store, cache) = setup();
    let entry = squares(&cache, &Runs::default(), 10);

    store.fail_when(|_| true);
    entry.call(CallArgs::new().arg(1)).await.unwrap();
    assert!(entry.is_offline());

    let error = entry.invalidate(&CallArgs::new().arg(1)).await.unwrap_err();
    assert!(error.is_unavailable());
    let error = entry.invalidate_all().await.unwrap_err();
    assert!(error.is_unavailable());
}

#[tokio::test]
async fn offline_state_is_per_entry() {
    let (_control, store, cache) = setup();
    let first = squares(&cache, &Runs::default(), 0);
    let second = squares(&cache, &Runs::default(), 0);

    store.fail_when(|op| matches!(op, StoreOp::Get(_)));
    first.call(CallArgs::new().arg(1)).await.unwrap();
    store.clear_failures();

    assert!(first.is_offline());
    assert!(!second.is_offline());
    second.call(CallArgs::new().arg(1)).await.unwrap();
    assert!(store.inner().contains_key(&key(1)));
}

#[tokio::test]
async fn rejected_read_propagates() {
    let (_control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 0);

    store.reject_when(|op| matches!(op, StoreOp::Get(_)));
    let error = entry.call(CallArgs::new().arg(3)).await.unwrap_err();

    assert!(!error.is_unavailable());
    assert!(!entry.is_offline());
    assert_eq!(runs.count(), 0);
}

#[tokio::test]
async fn failed_write_propagates() {
    let (_control, store, cache) = setup();
    let runs = Runs::default();
    let entry = squares(&cache, &runs, 0);

    store.reject_when(|op| matches!(op, StoreOp::Write(_)));
    let error = entry.call(CallArgs::new().arg(3)).await.unwrap_err();
    assert!(!error.is_unavailable());

    store.fail_when(|op| matches!(op, StoreOp::Write(_)));
    let error = entry.call(CallArgs::new().arg(3)).await.unwrap_err();
    assert!(error.is_unavailable());

    assert!(!entry.is_offline(), "only read failures switch an entry offline");
    assert_eq!(runs.count(), 2);
}

#[tokio::test]
async fn failed_invalidation_propagates() {
    let (_control, store, cache) = setup();
    let entry = squares(&cache, &Runs::default(), 3);

    store.reject_when(|op| matches!(op, StoreOp::Remove { .. } | StoreOp::TrackedKeys(_)));

    entry.invalidate(&CallArgs::new().arg(1)).await.unwrap_err();
    entry.invalidate_all().await.unwrap_err();
    assert!(!entry.is_offline());
}

#[tokio::test]
async fn failed_computation_is_not_stored() {
    let (_control, store, cache) = setup();
    let entry = cache
        .entry()
        .namespace("checked")
        .wrap(|args: CallArgs| async move {
            let n: i64 = args.parse(0).map_err(std::io::Error::other)?;
            if n < 0 {
                return Err(std::io::Error::other("negative input"));
            }
            Ok(n)
        });

    let error = entry.call(CallArgs::new().arg(-1)).await.unwrap_err();
    assert!(!error.is_unavailable());
    let cause = error.find_source::<std::io::Error>().expect("computation error should be the cause");
    assert_eq!(cause.to_string(), "negative input");
    assert!(store.inner().is_empty());
    assert_eq!(store.operations(), vec![StoreOp::Get("rc:checked:[[-1],{}]".to_string())]);

    assert_eq!(entry.call(CallArgs::new().arg(1)).await.unwrap(), 1);
    assert_eq!(store.inner().len(), 1);
}

#[tokio::test]
async fn method_entries_ignore_the_receiver() {
    let (_control, _store, cache) = setup();
    let runs = Runs::default();
    let task_runs = runs.clone();
    let entry = cache
        .entry()
        .namespace("repo.count")
        .method()
        .wrap(move |args: CallArgs| -> Computation {
            let runs = task_runs.clone();
            Box::pin(async move {
                runs.bump();
                args.parse::<i64>(1)
            })
        });

    let first = CallArgs::new().arg("repo-a").arg(10);
    let second = CallArgs::new().arg("repo-b").arg(10);
    assert_eq!(entry.key(&first).unwrap(), "rc:repo.count:[[10],{}]");

    assert_eq!(entry.call(first).await.unwrap(), 10);
    assert_eq!(entry.call(second.clone()).await.unwrap(), 10);
    assert_eq!(runs.count(), 1);

    entry.invalidate(&second).await.unwrap();
    entry.call(CallArgs::new().arg("repo-c").arg(10)).await.unwrap();
    assert_eq!(runs.count(), 2);
}

#[tokio::test]
async fn namespaces_do_not_share_results() {
    let (_control, _store, cache) = setup();
    let runs = Runs::default();
    let squares = squares(&cache, &runs, 0);
    let doubles = cache
        .entry()
        .namespace("doubles")
        .wrap(|args: CallArgs| async move { Ok::<_, Error>(args.parse::<i64>(0)? * 2) });

    assert_eq!(squares.call(CallArgs::new().arg(5)).await.unwrap(), 25);
    assert_eq!(doubles.call(CallArgs::new().arg(5)).await.unwrap(), 10);
}

#[tokio::test]
async fn custom_prefix_is_applied_to_every_key() {
    let control = ClockControl::new();
    let store = MockStore::new(control.to_clock());
    let cache = Cache::builder(store.clone(), control.to_clock()).prefix("svc").build();
    let entry = cache
        .entry()
        .namespace("ns")
        .limit(1)
        .wrap(|args: CallArgs| async move { args.parse::<i64>(0) });

    entry.call(CallArgs::new().arg(1)).await.unwrap();

    assert!(store.inner().contains_key("svc:ns:[[1],{}]"));
    assert_eq!(store.inner().tracked("svc:ns:keys"), Some(vec!["svc:ns:[[1],{}]".to_string()]));
}

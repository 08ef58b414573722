// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A computation wrapped with cache semantics.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use rcache_store::{AtomicWrite, Error, Store};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    CallArgs, Codec, KeyBuilder,
    batch::{Batchable, sealed::Sealed},
    cache::Shared,
    telemetry::{CacheActivity, CacheOperation, ext::ClockExt},
};

/// A computation wrapped with cache semantics.
///
/// Created by [`EntryBuilder::wrap`](crate::EntryBuilder::wrap). Each call derives a key
/// from its arguments, returns the stored result on a hit, and on a miss runs the
/// computation and writes its result with the store's atomic store-track-evict protocol.
///
/// # Offline mode
///
/// If a read fails because the store is unreachable, the entry goes offline: that call and
/// every later call run the computation directly without touching the store. The transition
/// is one-way; create a new entry to use the store again. Other store failures, and any
/// failure while writing, propagate to the caller.
///
/// Invalidation always goes to the store, offline or not, so callers learn whether stale
/// results were actually removed.
///
/// # Concurrency
///
/// Calls are not coordinated. Concurrent misses on the same key each run the computation
/// and each write; the last write wins.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use rcache::{Cache, CallArgs};
/// use rcache_store::MemoryStore;
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// static RUNS: AtomicUsize = AtomicUsize::new(0);
///
/// let clock = Clock::new_frozen();
/// let cache = Cache::builder(MemoryStore::new(clock.clone()), clock).build();
/// let double = cache.entry().namespace("double").wrap(|args: CallArgs| async move {
///     RUNS.fetch_add(1, Ordering::Relaxed);
///     Ok::<_, rcache::Error>(args.parse::<i64>(0)? * 2)
/// });
///
/// assert_eq!(double.call(CallArgs::new().arg(21)).await?, 42);
/// assert_eq!(double.call(CallArgs::new().arg(21)).await?, 42);
/// assert_eq!(RUNS.load(Ordering::Relaxed), 1);
///
/// double.invalidate(&CallArgs::new().arg(21)).await?;
/// assert_eq!(double.call(CallArgs::new().arg(21)).await?, 42);
/// assert_eq!(RUNS.load(Ordering::Relaxed), 2);
/// # Ok::<(), rcache::Error>(())
/// # });
/// ```
pub struct CachedFn<S, C, F> {
    shared: Arc<Shared<S, C>>,
    keys: KeyBuilder<C>,
    ttl: Option<Duration>,
    limit: u64,
    offline: AtomicBool,
    function: F,
}

impl<S, C: std::fmt::Debug, F> std::fmt::Debug for CachedFn<S, C, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFn")
            .field("keys", &self.keys)
            .field("ttl", &self.ttl)
            .field("limit", &self.limit)
            .field("offline", &self.is_offline())
            .finish_non_exhaustive()
    }
}

impl<S, C, F> CachedFn<S, C, F> {
    pub(crate) fn new(shared: Arc<Shared<S, C>>, keys: KeyBuilder<C>, ttl: Option<Duration>, limit: u64, function: F) -> Self {
        Self {
            shared,
            keys,
            ttl,
            limit,
            offline: AtomicBool::new(false),
            function,
        }
    }

    /// Returns `true` once the store was found unreachable.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    /// The namespace of every key this entry derives.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.keys.namespace()
    }

    /// The key of the namespace's tracking set.
    #[must_use]
    pub fn tracking_key(&self) -> &str {
        self.keys.tracking_key()
    }

    /// The expiry of stored results, if any.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// The eviction limit, `0` meaning untracked.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    fn record(&self, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        self.shared.telemetry.record(self.keys.namespace(), operation, activity, duration);
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::Release);
    }
}

impl<S, C: Codec, F> CachedFn<S, C, F> {
    /// Derives the key a call with `args` reads and writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec cannot encode the arguments.
    pub fn key(&self, args: &CallArgs) -> Result<String, Error> {
        self.keys.build(args)
    }

    fn atomic_write<R: Serialize>(&self, key: String, value: &R) -> Result<AtomicWrite, Error> {
        let encoded = self.keys.codec().encode(value)?;
        Ok(AtomicWrite::new(key, self.keys.tracking_key(), encoded.into_bytes())
            .with_ttl(self.ttl)
            .with_limit(self.limit))
    }
}

impl<S, C, F, Fut, R, E> CachedFn<S, C, F>
where
    S: Store,
    C: Codec,
    F: Fn(CallArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send,
    R: Serialize + DeserializeOwned + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Returns the cached result for `args`, computing and storing it on a miss.
    ///
    /// A stored value that is empty counts as a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the computation fails, if the key or value cannot be encoded or
    /// decoded, or if the store fails for any reason other than being unreachable during
    /// the read. Failed computations are never stored.
    pub async fn call(&self, args: CallArgs) -> Result<R, Error> {
        if self.is_offline() {
            self.record(CacheOperation::Call, CacheActivity::Bypass, None);
            return self.compute(args).await;
        }

        let key = self.keys.build(&args)?;
        let read = self.shared.clock.timed_async(self.shared.store.get(&key)).await;
        let stored = match read.result {
            Ok(stored) => stored,
            Err(error) if error.is_unavailable() => {
                self.go_offline();
                self.record(CacheOperation::Call, CacheActivity::Offline, Some(read.duration));
                return self.compute(args).await;
            }
            Err(error) => {
                self.record(CacheOperation::Call, CacheActivity::Error, Some(read.duration));
                return Err(error);
            }
        };

        if let Some(bytes) = stored.filter(|bytes| !bytes.is_empty()) {
            self.record(CacheOperation::Call, CacheActivity::Hit, Some(read.duration));
            return self.keys.codec().decode(&bytes);
        }

        self.record(CacheOperation::Call, CacheActivity::Miss, Some(read.duration));
        let value = self.compute(args).await?;
        let write = self.atomic_write(key, &value)?;

        let written = self.shared.clock.timed_async(self.shared.store.write(&write)).await;
        match written.result {
            Ok(()) => {
                self.record(CacheOperation::Call, CacheActivity::Stored, Some(written.duration));
                Ok(value)
            }
            Err(error) => {
                self.record(CacheOperation::Call, CacheActivity::Error, Some(written.duration));
                Err(error)
            }
        }
    }

    /// Removes the stored result for `args`, untracking it when the entry has a limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be encoded or the store fails.
    pub async fn invalidate(&self, args: &CallArgs) -> Result<(), Error> {
        let key = self.keys.build(args)?;
        let tracking_key = (self.limit > 0).then(|| self.keys.tracking_key());
        let removed = self
            .shared
            .clock
            .timed_async(self.shared.store.remove(&key, tracking_key))
            .await;
        self.finish(CacheOperation::Invalidate, removed.result, removed.duration)
    }

    /// Removes every tracked result of the namespace together with the tracking set.
    ///
    /// Untracked entries (limit `0`) have no tracking set, so this does nothing for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn invalidate_all(&self) -> Result<(), Error> {
        if self.limit == 0 {
            self.record(CacheOperation::InvalidateAll, CacheActivity::Bypass, None);
            return Ok(());
        }

        let deleted = self
            .shared
            .clock
            .timed_async(async {
                let mut keys = self.shared.store.tracked_keys(self.keys.tracking_key()).await?;
                keys.push(self.keys.tracking_key().to_owned());
                self.shared.store.delete(&keys).await
            })
            .await;
        self.finish(CacheOperation::InvalidateAll, deleted.result, deleted.duration)
    }

    async fn compute(&self, args: CallArgs) -> Result<R, Error> {
        (self.function)(args).await.map_err(Error::computation)
    }

    fn finish(&self, operation: CacheOperation, result: Result<(), Error>, duration: Duration) -> Result<(), Error> {
        let activity = if result.is_ok() {
            CacheActivity::Invalidated
        } else {
            CacheActivity::Error
        };
        self.record(operation, activity, Some(duration));
        result
    }
}

impl<S, C, F> Sealed for CachedFn<S, C, F> {}

impl<S, C, F, Fut, R, E> Batchable<R> for CachedFn<S, C, F>
where
    S: Store,
    C: Codec,
    F: Fn(CallArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize + DeserializeOwned + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    fn batch_namespace(&self) -> &str {
        self.keys.namespace()
    }

    fn batch_key(&self, args: &CallArgs) -> Result<String, Error> {
        self.keys.build(args)
    }

    fn batch_decode(&self, bytes: &[u8]) -> Result<R, Error> {
        self.keys.codec().decode(bytes)
    }

    fn batch_compute(&self, args: CallArgs) -> BoxFuture<'_, Result<R, Error>> {
        Box::pin(self.compute(args))
    }

    fn batch_write(&self, key: String, value: &R) -> Result<AtomicWrite, Error> {
        self.atomic_write(key, value)
    }

    fn batch_origin(&self) -> *const () {
        Arc::as_ptr(&self.shared).cast()
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fetching many cached results in two round trips.

use futures::future::BoxFuture;
use rcache_store::{AtomicWrite, Error, Store};

use crate::{
    CallArgs, Codec,
    cache::Shared,
    telemetry::{CacheActivity, CacheOperation, ext::ClockExt},
};

pub(crate) mod sealed {
    pub(crate) trait Sealed {}
}

/// A wrapped computation that can take part in a [`Batch`].
///
/// This trait is sealed and implemented by [`CachedFn`](crate::CachedFn) for every
/// computation producing `R`.
#[expect(private_bounds, reason = "intentionally sealed trait pattern")]
pub trait Batchable<R>: sealed::Sealed + Send + Sync {
    #[doc(hidden)]
    fn batch_namespace(&self) -> &str;

    #[doc(hidden)]
    fn batch_key(&self, args: &CallArgs) -> Result<String, Error>;

    #[doc(hidden)]
    fn batch_decode(&self, bytes: &[u8]) -> Result<R, Error>;

    #[doc(hidden)]
    fn batch_compute(&self, args: CallArgs) -> BoxFuture<'_, Result<R, Error>>;

    #[doc(hidden)]
    fn batch_write(&self, key: String, value: &R) -> Result<AtomicWrite, Error>;

    #[doc(hidden)]
    fn batch_origin(&self) -> *const ();
}

/// Calls to one or more wrapped computations fetched together.
///
/// Created by [`Cache::batch`](crate::Cache::batch). [`fetch`](Self::fetch) reads every key
/// with one multi-key read, runs the computations of the misses one after another in the
/// order they were added, and writes all computed results in one pipelined round trip.
/// Results come back in the order the calls were added.
///
/// Each write is individually atomic; the batch as a whole is not. Batches always read
/// and write through the store of the cache that created them, regardless of the offline
/// state of the entries involved. Every entry must be wrapped by that same cache;
/// [`fetch`](Self::fetch) fails without touching the store otherwise.
///
/// # Examples
///
/// ```
/// use rcache::{Cache, CallArgs};
/// use rcache_store::MemoryStore;
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let clock = Clock::new_frozen();
/// let cache = Cache::builder(MemoryStore::new(clock.clone()), clock).build();
///
/// let square = cache.entry().namespace("square").wrap(|args: CallArgs| async move {
///     Ok::<_, rcache::Error>(args.parse::<i64>(0)?.pow(2))
/// });
/// let cube = cache.entry().namespace("cube").wrap(|args: CallArgs| async move {
///     Ok::<_, rcache::Error>(args.parse::<i64>(0)?.pow(3))
/// });
///
/// let results = cache
///     .batch::<i64>()
///     .add(&square, CallArgs::new().arg(2))
///     .add(&cube, CallArgs::new().arg(2))
///     .add(&square, CallArgs::new().arg(3))
///     .fetch()
///     .await?;
///
/// assert_eq!(results, vec![4, 8, 9]);
/// # Ok::<(), rcache::Error>(())
/// # });
/// ```
pub struct Batch<'a, S, C, R> {
    shared: &'a Shared<S, C>,
    calls: Vec<(&'a dyn Batchable<R>, CallArgs)>,
}

impl<S, C, R> std::fmt::Debug for Batch<'_, S, C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field(
                "calls",
                &self
                    .calls
                    .iter()
                    .map(|(entry, args)| (entry.batch_namespace(), args))
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<'a, S: Store, C: Codec, R: Send> Batch<'a, S, C, R> {
    pub(crate) fn new(shared: &'a Shared<S, C>) -> Self {
        Self {
            shared,
            calls: Vec::new(),
        }
    }

    /// Adds a call of `entry` with `args`.
    #[must_use]
    pub fn add(mut self, entry: &'a dyn Batchable<R>, args: CallArgs) -> Self {
        self.push(entry, args);
        self
    }

    /// Adds a call of `entry` with `args` in place.
    pub fn push(&mut self, entry: &'a dyn Batchable<R>, args: CallArgs) {
        self.calls.push((entry, args));
    }

    /// The number of calls in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns `true` if no calls were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Fetches every result, computing and storing the misses.
    ///
    /// Batch-level telemetry events are labeled with the cache prefix in place of a
    /// namespace. An empty batch performs no store calls. The pipelined write is only sent when at
    /// least one call missed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::usage`] if an entry was wrapped by a different cache. Otherwise
    /// returns the first error from encoding a key, the multi-key read, decoding a hit,
    /// running a computation, or the pipelined write. Store failures are not treated as
    /// an offline condition here; they always propagate.
    pub async fn fetch(self) -> Result<Vec<R>, Error> {
        if self.calls.is_empty() {
            return Ok(Vec::new());
        }

        let origin = std::ptr::from_ref(self.shared).cast::<()>();
        if let Some((entry, _)) = self.calls.iter().find(|(entry, _)| !std::ptr::eq(entry.batch_origin(), origin)) {
            return Err(Error::usage(format!(
                "entry `{}` was wrapped by a different cache than the batch",
                entry.batch_namespace()
            )));
        }

        let timed = self.shared.clock.timed_async(self.run()).await;
        let activity = match &timed.result {
            Ok((_, 0)) => CacheActivity::Hit,
            Ok(_) => CacheActivity::Stored,
            Err(_) => CacheActivity::Error,
        };
        self.shared
            .telemetry
            .record(&self.shared.prefix, CacheOperation::Batch, activity, Some(timed.duration));

        timed.result.map(|(results, _)| results)
    }

    /// Returns the results and the number of misses written.
    async fn run(&self) -> Result<(Vec<R>, usize), Error> {
        let keys = self
            .calls
            .iter()
            .map(|(entry, args)| entry.batch_key(args))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self.shared.store.get_many(&keys).await?;

        let mut results = Vec::with_capacity(self.calls.len());
        let mut writes = Vec::new();
        for ((entry, args), (key, stored)) in self.calls.iter().zip(keys.into_iter().zip(stored)) {
            if let Some(bytes) = stored.filter(|bytes| !bytes.is_empty()) {
                self.record(*entry, CacheActivity::Hit);
                results.push(entry.batch_decode(&bytes)?);
            } else {
                self.record(*entry, CacheActivity::Miss);
                let value = entry.batch_compute(args.clone()).await?;
                writes.push(entry.batch_write(key, &value)?);
                results.push(value);
            }
        }

        if !writes.is_empty() {
            self.shared.store.write_batch(&writes).await?;
        }

        Ok((results, writes.len()))
    }

    fn record(&self, entry: &dyn Batchable<R>, activity: CacheActivity) {
        self.shared
            .telemetry
            .record(entry.batch_namespace(), CacheOperation::Batch, activity, None);
    }
}

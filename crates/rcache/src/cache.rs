// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache factory and its builders.

use std::{sync::Arc, time::Duration};

use rcache_store::Store;
use tick::Clock;

use crate::{Batch, CachedFn, Codec, JsonCodec, KeyBuilder, TelemetryConfig, telemetry::CacheTelemetry};

const DEFAULT_PREFIX: &str = "rc";

/// State shared by a cache and every entry and batch created from it.
#[derive(Debug)]
pub(crate) struct Shared<S, C> {
    pub(crate) store: S,
    pub(crate) prefix: String,
    pub(crate) codec: C,
    pub(crate) clock: Clock,
    pub(crate) telemetry: CacheTelemetry,
}

/// A result cache over one store.
///
/// A `Cache` holds the store handle, key prefix, codec, clock and telemetry shared by
/// every computation it wraps. Use [`entry`](Self::entry) to wrap a computation and
/// [`batch`](Self::batch) to fetch many results in two round trips.
///
/// Cloning is cheap; clones share the same store handle.
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
///     let n: i64 = args.parse(0)?;
///     Ok::<_, rcache::Error>(n * n)
/// });
///
/// assert_eq!(square.call(CallArgs::new().arg(12)).await?, 144);
/// # Ok::<(), rcache::Error>(())
/// # });
/// ```
pub struct Cache<S, C = JsonCodec> {
    shared: Arc<Shared<S, C>>,
}

impl<S, C> Clone for Cache<S, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, C: std::fmt::Debug> std::fmt::Debug for Cache<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("prefix", &self.shared.prefix)
            .field("codec", &self.shared.codec)
            .finish_non_exhaustive()
    }
}

impl<S: Store> Cache<S> {
    /// Starts building a cache over `store`.
    ///
    /// `clock` times store round trips for telemetry.
    pub fn builder(store: S, clock: Clock) -> CacheBuilder<S> {
        CacheBuilder {
            store,
            clock,
            prefix: DEFAULT_PREFIX.to_owned(),
            codec: JsonCodec,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl<S: Store, C: Codec> Cache<S, C> {
    /// Starts configuring a wrapped computation.
    #[must_use]
    pub fn entry(&self) -> EntryBuilder<S, C> {
        EntryBuilder {
            shared: Arc::clone(&self.shared),
            namespace: None,
            ttl: None,
            limit: 0,
            method: false,
        }
    }

    /// Starts a batch of calls whose results are all of type `R`.
    #[must_use]
    pub fn batch<R: Send>(&self) -> Batch<'_, S, C, R> {
        Batch::new(&self.shared)
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// The prefix of every key this cache writes.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.shared.prefix
    }

    /// The codec used for keys and values.
    #[must_use]
    pub fn codec(&self) -> &C {
        &self.shared.codec
    }
}

/// Builder for [`Cache`].
///
/// Created by [`Cache::builder`].
#[derive(Debug)]
pub struct CacheBuilder<S, C = JsonCodec> {
    store: S,
    clock: Clock,
    prefix: String,
    codec: C,
    telemetry: TelemetryConfig,
}

impl<S: Store, C: Codec> CacheBuilder<S, C> {
    /// Sets the prefix of every key. Defaults to `"rc"`.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replaces the codec. Defaults to [`JsonCodec`].
    pub fn codec<C2: Codec>(self, codec: C2) -> CacheBuilder<S, C2> {
        CacheBuilder {
            store: self.store,
            clock: self.clock,
            prefix: self.prefix,
            codec,
            telemetry: self.telemetry,
        }
    }

    /// Sets the telemetry configuration. Telemetry is disabled by default.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> Cache<S, C> {
        Cache {
            shared: Arc::new(Shared {
                store: self.store,
                prefix: self.prefix,
                codec: self.codec,
                clock: self.clock,
                telemetry: self.telemetry.build(),
            }),
        }
    }
}

/// Builder for a [`CachedFn`].
///
/// Created by [`Cache::entry`]. The configuration is fixed once the computation is
/// wrapped.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use rcache::{Cache, CallArgs};
/// use rcache_store::MemoryStore;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let cache = Cache::builder(MemoryStore::new(clock.clone()), clock).build();
///
/// let lookup = cache
///     .entry()
///     .namespace("users.lookup")
///     .ttl(Duration::from_secs(300))
///     .limit(1_000)
///     .wrap(|args: CallArgs| async move { Ok::<_, rcache::Error>(args.parse::<String>(0)?.len()) });
///
/// assert_eq!(lookup.namespace(), "users.lookup");
/// assert_eq!(lookup.tracking_key(), "rc:users.lookup:keys");
/// ```
pub struct EntryBuilder<S, C = JsonCodec> {
    shared: Arc<Shared<S, C>>,
    namespace: Option<String>,
    ttl: Option<Duration>,
    limit: u64,
    method: bool,
}

impl<S, C> std::fmt::Debug for EntryBuilder<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryBuilder")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .field("limit", &self.limit)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl<S: Store, C: Codec> EntryBuilder<S, C> {
    /// Overrides the namespace.
    ///
    /// Defaults to the type name of the wrapped computation, which for a function item is
    /// its fully qualified path. Closures defined in the same function share a type name
    /// prefix, so give them explicit namespaces.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the expiry of stored results. Zero, the default, means no expiry.
    ///
    /// The store keeps millisecond precision; shorter non-zero expiries round up to one
    /// millisecond.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl).filter(|ttl| !ttl.is_zero());
        self
    }

    /// Caps the number of results kept for the namespace, evicting the least recently
    /// written. Zero, the default, disables tracking and eviction.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Excludes the first positional argument, the receiver, from keys.
    #[must_use]
    pub fn method(mut self) -> Self {
        self.method = true;
        self
    }

    /// Wraps `function` with cache semantics.
    ///
    /// `function` receives the call's arguments and is invoked on every miss, and on
    /// every call once the entry is offline.
    pub fn wrap<F>(self, function: F) -> CachedFn<S, C, F> {
        let namespace = self
            .namespace
            .unwrap_or_else(|| std::any::type_name::<F>().to_owned());
        let keys = KeyBuilder::new(self.shared.prefix.clone(), namespace, self.shared.codec.clone()).skip_receiver(self.method);
        CachedFn::new(self.shared, keys, self.ttl, self.limit, function)
    }
}

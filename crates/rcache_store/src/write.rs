// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// The longest expiry a write carries, in milliseconds (2^53, roughly 285,000 years).
///
/// Fits the millisecond expiry range of Redis and is exact as a Lua number.
pub const MAX_TTL_MILLIS: u64 = 1 << 53;

/// A single store-and-track request.
///
/// Executing an `AtomicWrite` is one indivisible operation on the store:
///
/// 1. The value is stored under [`key`](Self::key), with an expiry when a ttl is set
///    and without one otherwise (a previous expiry is cleared).
/// 2. When [`limit`](Self::limit) is non-zero, the key is added to the sorted set at
///    [`tracking_key`](Self::tracking_key), scored by the store's current time. If the
///    set then holds more than `limit` members, the lowest-scored surplus is popped and
///    each popped key is deleted from the store.
///
/// # Examples
///
/// ```
/// use rcache_store::AtomicWrite;
/// use std::time::Duration;
///
/// let write = AtomicWrite::new("rc:ns:[[1],{}]", "rc:ns:keys", b"42".to_vec())
///     .with_ttl(Duration::from_secs(30))
///     .with_limit(100);
///
/// assert_eq!(write.ttl_millis(), 30_000);
/// assert!(write.is_tracked());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomicWrite {
    key: String,
    tracking_key: String,
    value: Vec<u8>,
    ttl: Option<Duration>,
    limit: u64,
}

impl AtomicWrite {
    /// Creates an untracked write without expiry.
    pub fn new(key: impl Into<String>, tracking_key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            tracking_key: tracking_key.into(),
            value,
            ttl: None,
            limit: 0,
        }
    }

    /// Sets the expiry of the stored value. A zero duration means no expiry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: impl Into<Option<Duration>>) -> Self {
        self.ttl = ttl.into().filter(|ttl| !ttl.is_zero());
        self
    }

    /// Sets the eviction limit of the tracking set. Zero disables tracking.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// The primary key the value is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The sorted set recording recency of writes for the namespace.
    #[must_use]
    pub fn tracking_key(&self) -> &str {
        &self.tracking_key
    }

    /// The serialized value.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The expiry of the stored value, if any.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// The expiry in whole milliseconds, `0` meaning no expiry.
    ///
    /// Sub-millisecond expiries round up to one millisecond so that a configured
    /// ttl never turns into a persistent value. Expiries beyond [`MAX_TTL_MILLIS`]
    /// are clamped to it.
    #[must_use]
    pub fn ttl_millis(&self) -> u64 {
        self.ttl.map_or(0, |ttl| {
            u64::try_from(ttl.as_millis())
                .unwrap_or(u64::MAX)
                .clamp(1, MAX_TTL_MILLIS)
        })
    }

    /// The maximum number of tracked keys, `0` meaning untracked.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns `true` when the write records the key in the tracking set.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.limit > 0
    }
}

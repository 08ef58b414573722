// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory store implementation.
//!
//! [`MemoryStore`] keeps values, expiries and tracking sets behind one mutex, so every
//! [`AtomicWrite`] runs as a single critical section exactly like a server-side script.
//! Time comes from a [`Clock`], which makes expiry and eviction order deterministic
//! under `tick::ClockControl`.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;
use tick::Clock;

use crate::{AtomicWrite, Error, Store};

/// A store that lives in process memory.
///
/// Useful for tests, local development, and single-process deployments. Cloning is
/// cheap and clones share the same data.
///
/// Semantics mirror a Redis server: values with an expiry disappear once the clock
/// passes it, writes without a ttl clear any previous expiry, tracking sets are scored
/// by the clock in microseconds, and a tracking set that becomes empty ceases to exist.
///
/// # Examples
///
/// ```
/// use rcache_store::{AtomicWrite, MemoryStore, Store};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let store = MemoryStore::new(Clock::new_frozen());
/// store.write(&AtomicWrite::new("rc:ns:a", "rc:ns:keys", b"1".to_vec()).with_limit(10)).await?;
///
/// assert_eq!(store.get("rc:ns:a").await?, Some(b"1".to_vec()));
/// assert_eq!(store.tracked("rc:ns:keys"), Some(vec!["rc:ns:a".to_string()]));
/// # Ok::<(), rcache_store::Error>(())
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct MemoryStore {
    clock: Clock,
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Creates an empty store driven by `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Returns the clock used for expiry and tracking scores.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Returns `true` if a live value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.system_time();
        self.state.lock().live(key, now).is_some()
    }

    /// Returns the remaining time to live of `key`.
    ///
    /// Returns `None` when the key is absent or has no expiry.
    #[must_use]
    pub fn expires_in(&self, key: &str) -> Option<Duration> {
        let now = self.clock.system_time();
        self.state
            .lock()
            .live(key, now)
            .and_then(|stored| stored.expires_at)
            .and_then(|expires_at| expires_at.duration_since(now).ok())
    }

    /// Returns the members of a tracking set, lowest score first.
    ///
    /// Returns `None` when the set does not exist.
    #[must_use]
    pub fn tracked(&self, tracking_key: &str) -> Option<Vec<String>> {
        self.state.lock().sets.get(tracking_key).map(SortedSet::members)
    }

    /// Returns the number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.system_time();
        let mut state = self.state.lock();
        state.purge_expired(now);
        state.values.len()
    }

    /// Returns `true` if no live values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn score(&self) -> u64 {
        self.clock
            .system_time()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |since_epoch| u64::try_from(since_epoch.as_micros()).unwrap_or(u64::MAX))
    }

    fn apply(&self, state: &mut State, write: &AtomicWrite) {
        let now = self.clock.system_time();
        state.values.insert(
            write.key().to_owned(),
            StoredValue {
                data: write.value().to_vec(),
                expires_at: write.ttl().and_then(|ttl| now.checked_add(ttl)),
            },
        );

        if !write.is_tracked() {
            return;
        }

        let set = state.sets.entry(write.tracking_key().to_owned()).or_default();
        set.insert(write.key(), self.score());

        let limit = usize::try_from(write.limit()).unwrap_or(usize::MAX);
        let over = set.len().saturating_sub(limit);
        if over > 0 {
            for stale in set.pop_min(over) {
                state.values.remove(&stale);
            }
        }
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let now = self.clock.system_time();
        Ok(self.state.lock().live(key, now).map(|stored| stored.data.clone()))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, Error> {
        let now = self.clock.system_time();
        let mut state = self.state.lock();
        Ok(keys
            .iter()
            .map(|key| state.live(key, now).map(|stored| stored.data.clone()))
            .collect())
    }

    async fn write(&self, write: &AtomicWrite) -> Result<(), Error> {
        let mut state = self.state.lock();
        self.apply(&mut state, write);
        Ok(())
    }

    async fn write_batch(&self, writes: &[AtomicWrite]) -> Result<(), Error> {
        for write in writes {
            let mut state = self.state.lock();
            self.apply(&mut state, write);
        }
        Ok(())
    }

    async fn remove(&self, key: &str, tracking_key: Option<&str>) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.values.remove(key);
        if let Some(tracking_key) = tracking_key {
            state.untrack(tracking_key, key);
        }
        Ok(())
    }

    async fn tracked_keys(&self, tracking_key: &str) -> Result<Vec<String>, Error> {
        Ok(self.tracked(tracking_key).unwrap_or_default())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), Error> {
        let mut state = self.state.lock();
        for key in keys {
            state.values.remove(key);
            state.sets.remove(key);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    values: HashMap<String, StoredValue>,
    sets: HashMap<String, SortedSet>,
}

impl State {
    fn live(&mut self, key: &str, now: SystemTime) -> Option<&StoredValue> {
        if self.values.get(key).is_some_and(|stored| stored.is_expired(now)) {
            self.values.remove(key);
        }
        self.values.get(key)
    }

    fn purge_expired(&mut self, now: SystemTime) {
        self.values.retain(|_, stored| !stored.is_expired(now));
    }

    fn untrack(&mut self, tracking_key: &str, member: &str) {
        if let Some(set) = self.sets.get_mut(tracking_key) {
            set.remove(member);
            if set.is_empty() {
                self.sets.remove(tracking_key);
            }
        }
    }
}

#[derive(Debug)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<SystemTime>,
}

impl StoredValue {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Members ordered by `(score, member)`; equal scores fall back to member order.
#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, u64>,
    ordered: BTreeSet<(u64, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: u64) {
        if let Some(previous) = self.scores.insert(member.to_owned(), score) {
            self.ordered.remove(&(previous, member.to_owned()));
        }
        self.ordered.insert((score, member.to_owned()));
    }

    fn remove(&mut self, member: &str) {
        if let Some(score) = self.scores.remove(member) {
            self.ordered.remove(&(score, member.to_owned()));
        }
    }

    fn pop_min(&mut self, count: usize) -> Vec<String> {
        let mut popped = Vec::with_capacity(count);
        while popped.len() < count {
            let Some((_, member)) = self.ordered.pop_first() else {
                break;
            };
            self.scores.remove(&member);
            popped.push(member);
        }
        popped
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }

    fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    fn members(&self) -> Vec<String> {
        self.ordered.iter().map(|(_, member)| member.clone()).collect()
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock store implementation for testing.
//!
//! This module provides `MockStore`, a [`MemoryStore`] wrapper that records every store
//! round trip and supports failure injection for testing error paths.

use std::sync::Arc;

use parking_lot::Mutex;
use tick::Clock;

use crate::{AtomicWrite, Error, MemoryStore, Store};

/// Recorded store round trip with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A single-key read.
    Get(String),
    /// A multi-key read.
    GetMany(Vec<String>),
    /// A single atomic write.
    Write(AtomicWrite),
    /// A pipelined batch of atomic writes.
    WriteBatch(Vec<AtomicWrite>),
    /// A delete-and-untrack of one key.
    Remove {
        /// The key that was deleted.
        key: String,
        /// The tracking set the key was removed from, if any.
        tracking_key: Option<String>,
    },
    /// A read of all members of a tracking set.
    TrackedKeys(String),
    /// A multi-key delete.
    Delete(Vec<String>),
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> Option<Error> + Send + Sync>;

/// A recording store for tests.
///
/// Data semantics come from an inner [`MemoryStore`]; on top of that every round trip is
/// recorded as a [`StoreOp`] and can be made to fail on demand.
///
/// # Examples
///
/// ```
/// use rcache_store::{Store, testing::{MockStore, StoreOp}};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let store = MockStore::new(Clock::new_frozen());
/// assert!(store.get("missing").await.unwrap().is_none());
/// assert_eq!(store.operations(), vec![StoreOp::Get("missing".to_string())]);
///
/// // Simulate a lost connection for every read.
/// store.fail_when(|op| matches!(op, StoreOp::Get(_)));
/// assert!(store.get("missing").await.unwrap_err().is_unavailable());
/// # });
/// ```
#[derive(Clone)]
pub struct MockStore {
    inner: MemoryStore,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("inner", &self.inner)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MockStore {
    /// Creates an empty mock store driven by `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::with_store(MemoryStore::new(clock))
    }

    /// Wraps an existing memory store, sharing its data.
    #[must_use]
    pub fn with_store(inner: MemoryStore) -> Self {
        Self {
            inner,
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the memory store holding the data.
    #[must_use]
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Makes matching operations fail as if the connection to the store was lost.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(move |op| predicate(op).then(|| Error::connection("mock: connection lost"))));
    }

    /// Makes matching operations fail as if the store rejected the command.
    pub fn reject_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(move |op| predicate(op).then(|| Error::command("mock: command rejected"))));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Returns the number of recorded round trips.
    #[must_use]
    pub fn round_trips(&self) -> usize {
        self.operations.lock().len()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: StoreOp) -> Result<(), Error> {
        let failure = self.fail_when.lock().as_ref().and_then(|predicate| predicate(&op));
        self.operations.lock().push(op);
        failure.map_or(Ok(()), Err)
    }
}

impl Store for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        self.record(StoreOp::Get(key.to_owned()))?;
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, Error> {
        self.record(StoreOp::GetMany(keys.to_vec()))?;
        self.inner.get_many(keys).await
    }

    async fn write(&self, write: &AtomicWrite) -> Result<(), Error> {
        self.record(StoreOp::Write(write.clone()))?;
        self.inner.write(write).await
    }

    async fn write_batch(&self, writes: &[AtomicWrite]) -> Result<(), Error> {
        self.record(StoreOp::WriteBatch(writes.to_vec()))?;
        self.inner.write_batch(writes).await
    }

    async fn remove(&self, key: &str, tracking_key: Option<&str>) -> Result<(), Error> {
        self.record(StoreOp::Remove {
            key: key.to_owned(),
            tracking_key: tracking_key.map(str::to_owned),
        })?;
        self.inner.remove(key, tracking_key).await
    }

    async fn tracked_keys(&self, tracking_key: &str) -> Result<Vec<String>, Error> {
        self.record(StoreOp::TrackedKeys(tracking_key.to_owned()))?;
        self.inner.tracked_keys(tracking_key).await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), Error> {
        self.record(StoreOp::Delete(keys.to_vec()))?;
        self.inner.delete(keys).await
    }
}

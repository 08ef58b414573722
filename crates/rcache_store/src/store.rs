// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for backing stores.
//!
//! [`Store`] is the narrow slice of a key-value store that the cache layer consumes.
//! Each method maps to a single round trip.

use crate::{AtomicWrite, Error};

/// Trait for backing store implementations.
///
/// Implementations must be cheap to share: the cache layer clones the store handle into
/// every wrapped computation it creates.
///
/// Connectivity failures must be reported with [`Error::connection`] so the cache layer
/// can distinguish an unreachable store from a rejected command. Deleting or untracking
/// absent keys is not an error.
pub trait Store: Send + Sync {
    /// Reads a single value.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send;

    /// Reads many values in one round trip, preserving the order of `keys`.
    fn get_many(&self, keys: &[String]) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>, Error>> + Send;

    /// Executes one [`AtomicWrite`] as an indivisible operation.
    fn write(&self, write: &AtomicWrite) -> impl Future<Output = Result<(), Error>> + Send;

    /// Executes many [`AtomicWrite`]s in one pipelined round trip.
    ///
    /// Each write is individually atomic; the batch as a whole is not.
    fn write_batch(&self, writes: &[AtomicWrite]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Deletes `key` and, when given, removes it from the tracking set, in one round trip.
    fn remove(&self, key: &str, tracking_key: Option<&str>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns every member of the tracking set, lowest score first.
    fn tracked_keys(&self, tracking_key: &str) -> impl Future<Output = Result<Vec<String>, Error>> + Send;

    /// Deletes every key in `keys` in one round trip.
    fn delete(&self, keys: &[String]) -> impl Future<Output = Result<(), Error>> + Send;
}

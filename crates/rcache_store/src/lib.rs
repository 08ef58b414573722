// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Store abstractions for the `rcache` result cache.
//!
//! This crate defines the [`Store`] trait that every backing key-value store must satisfy,
//! the [`AtomicWrite`] request describing the store-track-evict protocol, and the shared
//! [`Error`] type.
//!
//! # Overview
//!
//! A store holds serialized computation results under string keys. When a namespace has an
//! eviction limit, every write also records the key in a per-namespace tracking set scored by
//! the store's own clock, and the oldest members beyond the limit are evicted in the same
//! indivisible step. [`MemoryStore`] executes that protocol under a single lock; the
//! `rcache_redis` crate executes it as a server-side script.
//!
//! # Implementing a Store
//!
//! ```
//! use rcache_store::{AtomicWrite, Error, Store};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//!
//! struct PlainStore(RwLock<HashMap<String, Vec<u8>>>);
//!
//! impl Store for PlainStore {
//!     async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, Error> {
//!         let map = self.0.read().unwrap();
//!         Ok(keys.iter().map(|key| map.get(key).cloned()).collect())
//!     }
//!
//!     async fn write(&self, write: &AtomicWrite) -> Result<(), Error> {
//!         // Untracked store: ignores ttl and limit.
//!         self.0.write().unwrap().insert(write.key().to_owned(), write.value().to_vec());
//!         Ok(())
//!     }
//!
//!     async fn write_batch(&self, writes: &[AtomicWrite]) -> Result<(), Error> {
//!         for write in writes {
//!             self.write(write).await?;
//!         }
//!         Ok(())
//!     }
//!
//!     async fn remove(&self, key: &str, _tracking_key: Option<&str>) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//!
//!     async fn tracked_keys(&self, _tracking_key: &str) -> Result<Vec<String>, Error> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn delete(&self, keys: &[String]) -> Result<(), Error> {
//!         let mut map = self.0.write().unwrap();
//!         for key in keys {
//!             map.remove(key);
//!         }
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
mod memory;
mod store;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
mod write;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use store::Store;
#[doc(inline)]
pub use write::{AtomicWrite, MAX_TTL_MILLIS};

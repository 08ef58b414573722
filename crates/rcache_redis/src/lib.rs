// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis-backed store for the `rcache` result cache.
//!
//! [`RedisStore`] implements [`rcache_store::Store`] on top of a managed, multiplexed
//! connection. Every atomic write is a single Lua script execution: the value is stored
//! with its expiry, the key is recorded in the namespace's tracking set scored by the
//! server's `TIME`, and the oldest surplus keys are popped and deleted before the script
//! returns. Batches of writes are pipelined into one round trip.
//!
//! Connection failures (I/O errors, refused or dropped connections, timeouts) are reported
//! as [`Error::connection`](rcache_store::Error::connection), which the cache layer treats
//! as "store unavailable". Every other failure is permanent.
//!
//! The server must be Redis 5.0 or later.

mod script;
mod store;

#[doc(inline)]
pub use store::RedisStore;

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Transparent result caching for expensive computations.
//!
//! This crate wraps an async computation so that its results are stored in a shared
//! key-value store under a key derived deterministically from the call arguments. It
//! provides:
//! - Deterministic keys of the form `{prefix}:{namespace}:{encoded arguments}`
//! - Optional expiry and a per-namespace cap with oldest-first eviction, applied in one
//!   atomic step on the store
//! - Single-key and whole-namespace invalidation
//! - Batched lookups that read every key in one round trip and write all misses in another
//! - Offline fallback: once the store is unreachable, calls run the computation directly
//! - Pluggable codecs, JSON by default
//! - Optional logging (`logs` feature) and OpenTelemetry metrics (`metrics` feature)
//!
//! The store is abstracted by [`Store`]; [`MemoryStore`] runs in process and the
//! `rcache_redis` crate talks to a Redis server.
//!
//! # Examples
//!
//! ## Wrapping a Computation
//!
//! ```
//! use std::time::Duration;
//!
//! use rcache::{Cache, CallArgs};
//! use rcache_store::MemoryStore;
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let clock = Clock::new_frozen();
//! let cache = Cache::builder(MemoryStore::new(clock.clone()), clock)
//!     .prefix("app")
//!     .build();
//!
//! let word_count = cache
//!     .entry()
//!     .namespace("word_count")
//!     .ttl(Duration::from_secs(60))
//!     .limit(100)
//!     .wrap(|args: CallArgs| async move {
//!         let text: String = args.parse(0)?;
//!         Ok::<_, rcache::Error>(text.split_whitespace().count())
//!     });
//!
//! let args = CallArgs::new().arg("the quick brown fox");
//! assert_eq!(word_count.key(&args)?, r#"app:word_count:[["the quick brown fox"],{}]"#);
//! assert_eq!(word_count.call(args.clone()).await?, 4);
//!
//! word_count.invalidate(&args).await?;
//! word_count.invalidate_all().await?;
//! # Ok::<(), rcache::Error>(())
//! # });
//! ```
//!
//! ## Methods
//!
//! When the first positional argument is a receiver that should not take part in the key,
//! mark the entry as a method:
//!
//! ```
//! use rcache::{Cache, CallArgs};
//! use rcache_store::MemoryStore;
//! use tick::Clock;
//!
//! let clock = Clock::new_frozen();
//! let cache = Cache::builder(MemoryStore::new(clock.clone()), clock).build();
//!
//! let lookup = cache
//!     .entry()
//!     .namespace("repo.lookup")
//!     .method()
//!     .wrap(|args: CallArgs| async move { Ok::<_, rcache::Error>(args.parse::<u64>(1)?) });
//!
//! let a = lookup.key(&CallArgs::new().arg("repo-1").arg(7))?;
//! let b = lookup.key(&CallArgs::new().arg("repo-2").arg(7))?;
//! assert_eq!(a, b);
//! # Ok::<(), rcache::Error>(())
//! ```

mod args;
mod batch;
mod cache;
mod codec;
mod entry;
mod key;
mod telemetry;

#[doc(inline)]
pub use args::CallArgs;
#[doc(inline)]
pub use batch::{Batch, Batchable};
#[doc(inline)]
pub use cache::{Cache, CacheBuilder, EntryBuilder};
#[doc(inline)]
pub use codec::{BincodeCodec, Codec, Encoded, JsonCodec};
#[doc(inline)]
pub use entry::CachedFn;
#[doc(inline)]
pub use key::KeyBuilder;
#[doc(inline)]
pub use rcache_store::{AtomicWrite, Error, MemoryStore, Result, Store};
#[doc(inline)]
pub use telemetry::TelemetryConfig;

#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use rcache_store::testing::{MockStore, StoreOp};

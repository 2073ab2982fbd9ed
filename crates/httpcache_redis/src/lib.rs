// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis storage for [`httpcache`].
//!
//! [`RedisBackend`] stores each entry as the encoded [`httpcache::Envelope`]
//! under a Redis key that expires natively with `PSETEX`, so several processes
//! can share one cache.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use httpcache::HttpCache;
//! use httpcache_redis::RedisBackend;
//! use tick::Clock;
//!
//! # async fn example(clock: Clock) -> Result<(), httpcache::Error> {
//! let backend = RedisBackend::connect("redis://127.0.0.1/")
//!     .await?
//!     .key_fn(|key| format!("httpcache:{key}"));
//!
//! let layer = HttpCache::layer(backend, clock).default_expiration(Duration::from_secs(300));
//! # let _ = layer;
//! # Ok(())
//! # }
//! ```
//!
//! Entries written by an incompatible envelope format version read as
//! misses and are overwritten by the next successful fetch.

mod backend;

#[cfg(test)]
mod fake;

#[doc(inline)]
pub use backend::RedisBackend;

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process storage for [`httpcache`].
//!
//! [`InMemoryBackend`] keeps envelopes in a map guarded by a read-write lock.
//! Entries expire against the [`tick::Clock`] passed at construction, so the
//! backend and the cache agree on time and tests can drive both with
//! `tick::ClockControl`.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use httpcache::{HttpCache, HttpRequest, HttpResponse};
//! use httpcache_memory::InMemoryBackend;
//! use layered::{Execute, Layer, Service};
//! use tick::ClockControl;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let clock = ClockControl::new().to_clock();
//! let origin = Execute::new(|_request: HttpRequest| async move {
//!     Ok::<_, httpcache::Error>(HttpResponse::new(Bytes::from_static(b"hello")))
//! });
//!
//! let cache = HttpCache::layer(InMemoryBackend::new(clock.clone()), clock)
//!     .default_expiration(Duration::from_secs(60))
//!     .layer(origin);
//!
//! let request = http::Request::get("https://example.com/").body(Bytes::new()).unwrap();
//! let response = cache.execute(request).await.unwrap();
//! assert_eq!(response.body().as_ref(), b"hello");
//! # }
//! ```

mod backend;

#[doc(inline)]
pub use backend::InMemoryBackend;

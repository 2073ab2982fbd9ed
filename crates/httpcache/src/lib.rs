// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A caching decorator for outbound HTTP requests.
//!
//! [`HttpCache`] sits between a caller and a transport. It serves `GET`
//! responses from a time-bounded cache instead of contacting the origin again,
//! and merges concurrent misses for the same resource into a single origin
//! fetch.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use httpcache::{CACHE_EXPIRATION_HEADER, CacheBackend, HttpCache, HttpRequest, HttpResponse};
//! use layered::{Execute, Layer, Service};
//! use tick::Clock;
//!
//! # async fn example(backend: impl CacheBackend + 'static, clock: Clock) -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Execute::new(|_request: HttpRequest| async move {
//!     Ok::<_, httpcache::Error>(HttpResponse::new(Bytes::from_static(b"hello")))
//! });
//!
//! let client = HttpCache::layer(backend, clock)
//!     .default_expiration(Duration::from_secs(60))
//!     .layer(transport);
//!
//! // Cached for one hour instead of the default minute.
//! let request = http::Request::get("https://example.com/greeting")
//!     .header(CACHE_EXPIRATION_HEADER, "1h")
//!     .body(Bytes::new())?;
//!
//! let response = client.execute(request).await?;
//! assert_eq!(response.body().as_ref(), b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! # Deciding What to Cache
//!
//! Only `GET` requests are cached. The expiration comes from the
//! [`CACHE_EXPIRATION_HEADER`] request header when present, parsed as a
//! duration such as `1h30m0s`, `90s` or `PT1H`, and from
//! [`HttpCacheLayer::default_expiration`] otherwise. A request with neither is
//! forwarded untouched. A malformed header fails the request with a
//! [`Configuration`](ErrorKind::Configuration) error.
//!
//! Only `200 OK` responses are stored; every other status is returned as-is.
//!
//! # Storage
//!
//! Entries live in a [`CacheBackend`]. Each entry is an [`Envelope`] holding a
//! format version, the insertion time and the response in HTTP/1.1 wire format
//! (see [`CachedResponse`]). An entry is fresh while it is younger than the
//! request's expiration. Time is read only from the [`tick::Clock`] given to
//! [`HttpCache::layer`], so tests can control it with `tick::ClockControl`.
//!
//! Backend failures fail the request rather than falling back to the origin.
//!
//! # Coalescing
//!
//! Concurrent misses for the same key share one origin fetch, and all of them
//! receive its response or its error. The fetch runs on the tokio runtime and
//! completes even if every waiting caller goes away, so the cache is still
//! populated. A miss outside a tokio runtime fails with a
//! [`Configuration`](ErrorKind::Configuration) error. Services built from the
//! same [`HttpCacheLayer`] share their in-flight fetches.
//!
//! # Telemetry
//!
//! With the `logs` feature, [`HttpCacheLayer::enable_logs`] emits a `tracing`
//! event for every decision. With the `metrics` feature,
//! [`HttpCacheLayer::enable_metrics`] reports an `http.cache.event` counter
//! with an `http.cache.activity` attribute.

mod backend;
mod coalesce;
mod envelope;
mod error;
mod gate;
mod key_fn;
mod layer;
mod listener;
mod service;
mod telemetry;
mod wire;

#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use backend::CacheBackend;
#[doc(inline)]
pub use envelope::{Envelope, FORMAT_VERSION};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use layer::HttpCacheLayer;
#[doc(inline)]
pub use listener::CacheListener;
#[doc(inline)]
pub use service::HttpCache;
#[doc(inline)]
pub use wire::CachedResponse;

/// Request header carrying the expiration of a single request, e.g. `10m`.
///
/// It overrides [`HttpCacheLayer::default_expiration`] for that request only
/// and is removed before the request reaches the origin.
pub const CACHE_EXPIRATION_HEADER: &str = "x-httpclient-cache-expiration";

/// The request type handled by the cache.
pub type HttpRequest = http::Request<bytes::Bytes>;

/// The response type handled by the cache.
pub type HttpResponse = http::Response<bytes::Bytes>;

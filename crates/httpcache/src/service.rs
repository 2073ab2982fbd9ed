// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use layered::Service;
use tick::Clock;

use crate::coalesce::Coalescer;
use crate::gate::{Admission, CachePolicy, RequestGate};
use crate::listener::{Lookup, notify};
use crate::telemetry::{CacheActivity, CacheTelemetry};
use crate::{CacheBackend, CacheListener, CachedResponse, Envelope, HttpCacheLayer, HttpRequest, HttpResponse, Result};

/// Serves `GET` responses from a time-bounded cache in front of a transport.
///
/// `HttpCache` wraps any [`Service`] that turns an [`HttpRequest`] into a
/// `Result<HttpResponse, Error>` and implements that same contract, so it can
/// replace the transport wherever it is used. For every request it:
///
/// 1. bypasses the cache for non-`GET` requests and for requests with no
///    expiration, either from the [`CACHE_EXPIRATION_HEADER`] or the
///    configured default;
/// 2. looks the key up in the [`CacheBackend`] and serves the entry if it is
///    younger than the expiration;
/// 3. otherwise fetches from the origin, with at most one fetch per key in
///    flight, and stores `200 OK` responses.
///
/// Listeners are told about the hit or miss of every cached request, even when
/// its fetch is shared with other requests.
///
/// Backend failures and corrupt entries fail the request; the origin is not
/// consulted as a fallback.
///
/// # Runtime
///
/// Origin fetches are spawned onto the current tokio runtime. A cache miss
/// executed outside a tokio runtime fails with a
/// [`Configuration`](crate::ErrorKind::Configuration) error; hits and bypassed
/// requests work with any executor.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use bytes::Bytes;
/// use httpcache::{CacheBackend, HttpCache, HttpRequest, HttpResponse};
/// use layered::{Execute, Layer, Service};
/// use tick::Clock;
///
/// # async fn example(backend: impl CacheBackend + 'static, clock: Clock) -> Result<(), Box<dyn std::error::Error>> {
/// let origin = Execute::new(|request: HttpRequest| async move {
///     Ok::<_, httpcache::Error>(HttpResponse::new(Bytes::from(request.uri().to_string())))
/// });
///
/// let cache = HttpCache::layer(backend, clock)
///     .default_expiration(Duration::from_secs(300))
///     .layer(origin);
///
/// let request = http::Request::get("https://example.com/items").body(Bytes::new())?;
/// let response = cache.execute(request).await?;
/// assert_eq!(response.body().as_ref(), b"https://example.com/items");
/// # Ok(())
/// # }
/// ```
///
/// [`CACHE_EXPIRATION_HEADER`]: crate::CACHE_EXPIRATION_HEADER
#[derive(Debug)]
pub struct HttpCache<S, B> {
    pub(crate) shared: Arc<HttpCacheShared<B>>,
    pub(crate) inner: Arc<S>,
}

/// Configuration and state shared by clones of [`HttpCache`].
pub(crate) struct HttpCacheShared<B> {
    pub(crate) backend: Arc<B>,
    pub(crate) clock: Clock,
    pub(crate) gate: RequestGate,
    pub(crate) listeners: Vec<Arc<dyn CacheListener>>,
    pub(crate) coalescer: Coalescer<String, CachedResponse>,
    pub(crate) telemetry: CacheTelemetry,
}

impl<B> fmt::Debug for HttpCacheShared<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCacheShared")
            .field("clock", &self.clock)
            .field("gate", &self.gate)
            .field("listeners", &self.listeners.len())
            .field("coalescer", &self.coalescer)
            .finish_non_exhaustive()
    }
}

impl<S, B> Clone for HttpCache<S, B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> HttpCache<(), B> {
    /// Creates an [`HttpCacheLayer`] storing entries in `backend`.
    ///
    /// `clock` is the only source of time: it decides freshness and stamps
    /// stored entries.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::time::Duration;
    /// # use tick::Clock;
    /// use httpcache::{CacheBackend, HttpCache};
    ///
    /// # fn example(backend: impl CacheBackend, clock: Clock) {
    /// let layer = HttpCache::layer(backend, clock).default_expiration(Duration::from_secs(60));
    /// # }
    /// ```
    pub fn layer(backend: B, clock: Clock) -> HttpCacheLayer<B> {
        HttpCacheLayer::new(backend, clock)
    }
}

impl<S, B> Service<HttpRequest> for HttpCache<S, B>
where
    S: Service<HttpRequest, Out = Result<HttpResponse>> + 'static,
    B: CacheBackend + 'static,
{
    type Out = Result<HttpResponse>;

    async fn execute(&self, mut request: HttpRequest) -> Self::Out {
        let admission = self.shared.gate.evaluate(&mut request).inspect_err(|_| self.shared.record_failure(None))?;

        match admission {
            Admission::Bypass => {
                self.shared.telemetry.record(CacheActivity::Bypass, None);
                self.inner.execute(request).await
            }
            Admission::Cache(policy) => {
                let key = policy.key.clone();
                self.execute_cached(request, policy)
                    .await
                    .inspect_err(|_| self.shared.record_failure(Some(&key)))
            }
        }
    }
}

impl<S, B> HttpCache<S, B>
where
    S: Service<HttpRequest, Out = Result<HttpResponse>> + 'static,
    B: CacheBackend + 'static,
{
    async fn execute_cached(&self, request: HttpRequest, policy: CachePolicy) -> Result<HttpResponse> {
        let shared = &self.shared;

        let fresh = shared
            .backend
            .get(&policy.key)
            .await?
            .filter(|envelope| envelope.is_fresh(policy.ttl, shared.clock.system_time()));

        if let Some(envelope) = fresh {
            notify(&shared.listeners, Lookup::Hit, &request, &shared.telemetry);
            shared.telemetry.record(CacheActivity::Hit, Some(&policy.key));
            return CachedResponse::parse(envelope.payload()).map(CachedResponse::into_response);
        }

        notify(&shared.listeners, Lookup::Miss, &request, &shared.telemetry);
        shared.telemetry.record(CacheActivity::Miss, Some(&policy.key));

        let fetch_shared = Arc::clone(&self.shared);
        let inner = Arc::clone(&self.inner);
        let key = policy.key.clone();

        let response = shared
            .coalescer
            .run_exclusive(key, move || fetch_and_store(fetch_shared, inner, request, policy))
            .await?;

        Ok(response.into_response())
    }
}

/// Fetches from the origin and stores `200 OK` responses.
///
/// Runs detached from the request that started it, on behalf of every
/// request waiting for the same key.
async fn fetch_and_store<S, B>(shared: Arc<HttpCacheShared<B>>, inner: Arc<S>, request: HttpRequest, policy: CachePolicy) -> Result<CachedResponse>
where
    S: Service<HttpRequest, Out = Result<HttpResponse>>,
    B: CacheBackend,
{
    let response = CachedResponse::from_response(inner.execute(request).await?);

    if response.status() != StatusCode::OK {
        shared.telemetry.record(CacheActivity::StoreSkipped, Some(&policy.key));
        return Ok(response);
    }

    let envelope = Envelope::new(shared.clock.system_time(), response.to_bytes());
    shared.backend.set(&policy.key, envelope, policy.ttl).await?;
    shared.telemetry.record(CacheActivity::Stored, Some(&policy.key));

    Ok(response)
}

impl<B> HttpCacheShared<B> {
    fn record_failure(&self, key: Option<&str>) {
        self.telemetry.record(CacheActivity::Failed, key);
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use layered::Layer;
use tick::Clock;

use crate::coalesce::Coalescer;
use crate::gate::RequestGate;
use crate::key_fn::KeyFn;
use crate::service::HttpCacheShared;
use crate::telemetry::CacheTelemetry;
use crate::{CacheListener, CachedResponse, HttpCache, HttpRequest};

/// Builder for the caching middleware.
///
/// Created by [`HttpCache::layer`]. Every setting is optional; without a
/// [`default_expiration`](Self::default_expiration) only requests carrying the
/// [`CACHE_EXPIRATION_HEADER`](crate::CACHE_EXPIRATION_HEADER) are cached.
///
/// The configuration is fixed once [`Layer::layer`] builds a service. All
/// services built from one layer share its backend and its in-flight fetches,
/// so concurrent misses for a key are merged across them.
pub struct HttpCacheLayer<B> {
    backend: Arc<B>,
    clock: Clock,
    gate: RequestGate,
    listeners: Vec<Arc<dyn CacheListener>>,
    coalescer: Coalescer<String, CachedResponse>,
    telemetry: CacheTelemetry,
}

impl<B> HttpCacheLayer<B> {
    pub(crate) fn new(backend: B, clock: Clock) -> Self {
        Self {
            backend: Arc::new(backend),
            clock,
            gate: RequestGate::default(),
            listeners: Vec::new(),
            coalescer: Coalescer::new(),
            telemetry: CacheTelemetry::default(),
        }
    }

    /// Sets the expiration used when a request carries no expiration header.
    ///
    /// A zero duration disables caching for such requests.
    ///
    /// **Default**: None (requests without the header bypass the cache)
    #[must_use]
    pub fn default_expiration(mut self, expiration: Duration) -> Self {
        self.gate.default_expiration = Some(expiration);
        self
    }

    /// Adds a listener notified of every hit and miss.
    ///
    /// Listeners are called in the order they were added.
    #[must_use]
    pub fn listener(mut self, listener: impl CacheListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Overrides how cache keys are derived from requests.
    ///
    /// The function must be deterministic. Its output keys both the backend
    /// and the deduplication of concurrent fetches.
    ///
    /// **Default**: the full request URI
    #[must_use]
    pub fn key_fn(mut self, key_fn: impl Fn(&HttpRequest) -> String + Send + Sync + 'static) -> Self {
        self.gate.key_fn = KeyFn::new(key_fn);
        self
    }

    /// Emits a `tracing` event for every cache decision.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    pub fn enable_logs(mut self) -> Self {
        self.telemetry.logs_enabled = true;
        self
    }

    /// Reports the `http.cache.event` counter to the given meter provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        let meter = crate::telemetry::metrics::create_meter(provider);
        self.telemetry.event_counter = Some(crate::telemetry::metrics::create_event_counter(&meter));
        self
    }
}

impl<B> fmt::Debug for HttpCacheLayer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCacheLayer")
            .field("clock", &self.clock)
            .field("gate", &self.gate)
            .field("listeners", &self.listeners.len())
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl<S, B> Layer<S> for HttpCacheLayer<B> {
    type Service = HttpCache<S, B>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpCache {
            shared: Arc::new(HttpCacheShared {
                backend: Arc::clone(&self.backend),
                clock: self.clock.clone(),
                gate: self.gate.clone(),
                listeners: self.listeners.clone(),
                coalescer: self.coalescer.clone(),
                telemetry: self.telemetry.clone(),
            }),
            inner: Arc::new(inner),
        }
    }
}

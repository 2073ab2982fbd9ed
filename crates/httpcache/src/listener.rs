// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::HttpRequest;
use crate::telemetry::{CacheActivity, CacheTelemetry};

/// Observes the outcome of cache lookups.
///
/// Exactly one of the two methods is called for every request served through
/// the cache, right after the freshness check and before any origin fetch.
/// Coalesced requests are reported individually. Requests that bypass the
/// cache are not reported.
///
/// Listeners run synchronously on the request path and should return quickly.
/// A panicking listener is logged and otherwise ignored.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use httpcache::{CacheListener, HttpRequest};
///
/// #[derive(Debug, Default)]
/// struct HitRatio {
///     hits: AtomicU64,
///     misses: AtomicU64,
/// }
///
/// impl CacheListener for HitRatio {
///     fn on_hit(&self, _request: &HttpRequest) {
///         self.hits.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn on_miss(&self, _request: &HttpRequest) {
///         self.misses.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait CacheListener: Send + Sync {
    /// Called when a fresh entry is served from the cache.
    fn on_hit(&self, request: &HttpRequest);

    /// Called when the entry is absent or stale and the origin will be consulted.
    fn on_miss(&self, request: &HttpRequest);
}

impl<L: CacheListener + ?Sized> CacheListener for Arc<L> {
    fn on_hit(&self, request: &HttpRequest) {
        (**self).on_hit(request);
    }

    fn on_miss(&self, request: &HttpRequest) {
        (**self).on_miss(request);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    Hit,
    Miss,
}

/// Tells every listener about `lookup`, in registration order.
pub(crate) fn notify(listeners: &[Arc<dyn CacheListener>], lookup: Lookup, request: &HttpRequest, telemetry: &CacheTelemetry) {
    for listener in listeners {
        let outcome = catch_unwind(AssertUnwindSafe(|| match lookup {
            Lookup::Hit => listener.on_hit(request),
            Lookup::Miss => listener.on_miss(request),
        }));

        if outcome.is_err() {
            telemetry.record(CacheActivity::ListenerPanicked, None);
        }
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logs and metrics for cache decisions.
//!
//! Both are opt-in on the layer builder and compiled in only with the `logs`
//! and `metrics` features respectively.

#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

#[cfg(any(feature = "metrics", test))]
pub(crate) const HTTP_CACHE_ACTIVITY: &str = "http.cache.activity";

/// What happened to a request inside the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Bypass,
    Stored,
    StoreSkipped,
    ListenerPanicked,
    Failed,
}

impl CacheActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Bypass => "bypass",
            Self::Stored => "stored",
            Self::StoreSkipped => "store_skipped",
            Self::ListenerPanicked => "listener_panicked",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CacheTelemetry {
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_counter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg(any(feature = "logs", test))]
    pub(crate) logs_enabled: bool,
}

impl CacheTelemetry {
    #[cfg_attr(
        not(any(feature = "logs", test)),
        expect(unused_variables, reason = "the key is only used by logs")
    )]
    pub(crate) fn record(&self, activity: CacheActivity, key: Option<&str>) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(counter) = &self.event_counter {
            counter.add(1, &[opentelemetry::KeyValue::new(HTTP_CACHE_ACTIVITY, activity.as_str())]);
        }

        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            Self::emit(activity, key);
        }
    }

    #[cfg(any(feature = "logs", test))]
    fn emit(activity: CacheActivity, key: Option<&str>) {
        let name = activity.as_str();

        // Tracing levels must be constant.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(http.cache.activity = name, http.cache.key = key, "http.cache.event")
            };
        }

        match activity {
            CacheActivity::Hit | CacheActivity::Miss | CacheActivity::Bypass | CacheActivity::Stored | CacheActivity::StoreSkipped => {
                emit_event!(debug);
            }
            CacheActivity::ListenerPanicked => emit_event!(warn),
            CacheActivity::Failed => emit_event!(error),
        }
    }
}

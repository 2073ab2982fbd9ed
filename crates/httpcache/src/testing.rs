// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for code built on top of the cache.
//!
//! [`MockBackend`] stores envelopes in memory, records every operation and can
//! be told to fail. [`RecordingListener`] counts hits and misses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{CacheBackend, CacheListener, Envelope, Error, HttpRequest, Result};

/// A backend operation recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    /// A read of the given key.
    Get(String),
    /// A write of an envelope.
    Set {
        /// The key written.
        key: String,
        /// The envelope written.
        envelope: Envelope,
        /// The expiration requested by the cache.
        ttl: Duration,
    },
}

type FailPredicate = Box<dyn Fn(&BackendOp) -> bool + Send + Sync>;

/// An in-memory [`CacheBackend`] that records operations.
///
/// The mock keeps every envelope forever; freshness is left entirely to the
/// cache, which makes it suitable for checking what the cache reads and writes.
///
/// # Examples
///
/// ```
/// use httpcache::testing::{BackendOp, MockBackend};
/// use httpcache::CacheBackend;
///
/// # async fn example() {
/// let backend = MockBackend::new();
/// backend.fail_when(|op| matches!(op, BackendOp::Set { .. }));
///
/// assert!(backend.get("key").await.unwrap().is_none());
/// assert_eq!(backend.operations(), vec![BackendOp::Get("key".to_string())]);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MockBackend {
    data: Arc<Mutex<HashMap<String, Envelope>>>,
    operations: Arc<Mutex<Vec<BackendOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MockBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `envelope` under `key` without recording an operation.
    pub fn seed(&self, key: impl Into<String>, envelope: Envelope) {
        self.data.lock().insert(key.into(), envelope);
    }

    /// Returns the envelope stored under `key`.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<Envelope> {
        self.data.lock().get(key).cloned()
    }

    /// Makes every operation matching `predicate` fail with a backend error.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&BackendOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Lets all operations succeed again.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns all recorded operations, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<BackendOp> {
        self.operations.lock().clone()
    }

    /// Returns the number of recorded `set` operations.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.operations.lock().iter().filter(|op| matches!(op, BackendOp::Set { .. })).count()
    }

    fn record(&self, op: BackendOp) -> Result<()> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);

        if fail {
            return Err(Error::backend("mock: operation failed"));
        }
        Ok(())
    }
}

impl CacheBackend for MockBackend {
    async fn get(&self, key: &str) -> Result<Option<Envelope>> {
        self.record(BackendOp::Get(key.to_string()))?;
        Ok(self.entry(key))
    }

    async fn set(&self, key: &str, envelope: Envelope, ttl: Duration) -> Result<()> {
        self.record(BackendOp::Set {
            key: key.to_string(),
            envelope: envelope.clone(),
            ttl,
        })?;
        self.data.lock().insert(key.to_string(), envelope);
        Ok(())
    }
}

/// A [`CacheListener`] that counts notifications and remembers request URIs.
#[derive(Debug, Default)]
pub struct RecordingListener {
    hits: Mutex<Vec<String>>,
    misses: Mutex<Vec<String>>,
}

impl RecordingListener {
    /// Creates a listener with no recorded notifications.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of hits observed.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.lock().len()
    }

    /// The number of misses observed.
    #[must_use]
    pub fn misses(&self) -> usize {
        self.misses.lock().len()
    }

    /// The URIs of all notified requests, hits first.
    #[must_use]
    pub fn uris(&self) -> Vec<String> {
        let mut uris = self.hits.lock().clone();
        uris.extend(self.misses.lock().iter().cloned());
        uris
    }
}

impl CacheListener for RecordingListener {
    fn on_hit(&self, request: &HttpRequest) {
        self.hits.lock().push(request.uri().to_string());
    }

    fn on_miss(&self, request: &HttpRequest) {
        self.misses.lock().push(request.uri().to_string());
    }
}

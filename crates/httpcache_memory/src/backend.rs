// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use httpcache::{CacheBackend, Envelope, Result};
use parking_lot::RwLock;
use tick::Clock;

#[derive(Debug)]
struct Entry {
    envelope: Envelope,
    // `None` when the deadline does not fit in `SystemTime`.
    expires_at: Option<SystemTime>,
}

impl Entry {
    fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// A [`CacheBackend`] storing envelopes in process memory.
///
/// Each entry is dropped once the expiration passed to
/// [`set`](CacheBackend::set) has elapsed on the backend's clock. Expired
/// entries are removed lazily, when they are next read. Clones share the same
/// storage.
///
/// The backend never fails and is unbounded; it suits tests and processes with
/// a modest number of distinct URLs.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use bytes::Bytes;
/// use httpcache::{CacheBackend, Envelope};
/// use httpcache_memory::InMemoryBackend;
/// use tick::ClockControl;
///
/// # futures::executor::block_on(async {
/// let control = ClockControl::new();
/// let clock = control.to_clock();
/// let backend = InMemoryBackend::new(clock.clone());
///
/// let envelope = Envelope::new(clock.system_time(), Bytes::from_static(b"payload"));
/// backend.set("key", envelope, Duration::from_secs(60)).await.unwrap();
/// assert!(backend.get("key").await.unwrap().is_some());
///
/// control.advance(Duration::from_secs(60));
/// assert!(backend.get("key").await.unwrap().is_none());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    clock: Clock,
}

impl InMemoryBackend {
    /// Creates an empty backend that expires entries against `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            entries: Arc::default(),
            clock,
        }
    }

    /// The number of stored entries, including expired ones not yet removed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.system_time();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Envelope>> {
        let now = self.clock.system_time();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.envelope.clone())),
                Some(_) => {}
            }
        }

        // Another writer may have replaced the entry since the read lock was released.
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, envelope: Envelope, ttl: Duration) -> Result<()> {
        let expires_at = self.clock.system_time().checked_add(ttl);
        self.entries.write().insert(key.to_string(), Entry { envelope, expires_at });
        Ok(())
    }
}

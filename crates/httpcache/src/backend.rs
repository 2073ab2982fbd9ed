// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The storage contract the cache relies on.

use std::sync::Arc;
use std::time::Duration;

use crate::{Envelope, Result};

/// Storage for cached envelopes.
///
/// Implementations own physical expiry: a remote store should map `ttl` onto
/// its native per-key expiry, while an in-process store records an absolute
/// expiration instant and compares it against its clock on every read.
///
/// A missing entry is `Ok(None)`. Errors are reserved for I/O failures and
/// corrupt entries; the cache surfaces them to the caller instead of falling
/// back to the origin.
pub trait CacheBackend: Send + Sync {
    /// Reads the envelope stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Envelope>>> + Send;

    /// Stores `envelope` under `key`, replacing any previous entry.
    fn set(&self, key: &str, envelope: Envelope, ttl: Duration) -> impl Future<Output = Result<()>> + Send;
}

impl<B> CacheBackend for Arc<B>
where
    B: CacheBackend,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Envelope>>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &str, envelope: Envelope, ttl: Duration) -> impl Future<Output = Result<()>> + Send {
        (**self).set(key, envelope, ttl)
    }
}

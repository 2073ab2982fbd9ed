// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use httpcache::{CacheBackend, Envelope, Error, Result};
use redis::AsyncCommands;
use redis::aio::{ConnectionLike, ConnectionManager};

type RedisKeyFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A [`CacheBackend`] storing envelopes in Redis.
///
/// Values are written with `PSETEX`, so Redis drops an entry once the
/// expiration passed to [`set`](CacheBackend::set) has elapsed; durations
/// below one millisecond are rounded up to one. Every operation runs on a
/// clone of the connection, which for [`ConnectionManager`] shares one
/// multiplexed, reconnecting connection.
///
/// Connection and protocol failures surface as
/// [`Backend`](httpcache::ErrorKind::Backend) errors and values that are not
/// valid envelopes as [`Decode`](httpcache::ErrorKind::Decode) errors.
#[derive(Clone)]
pub struct RedisBackend<C = ConnectionManager> {
    connection: C,
    key_fn: Option<RedisKeyFn>,
}

impl RedisBackend<ConnectionManager> {
    /// Connects to the Redis server at `url`, e.g. `redis://127.0.0.1:6379/0`.
    ///
    /// # Errors
    ///
    /// Returns a [`Backend`](httpcache::ErrorKind::Backend) error if the URL
    /// is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(Error::backend)?;
        let connection = ConnectionManager::new(client).await.map_err(Error::backend)?;
        Ok(Self::new(connection))
    }
}

impl<C> RedisBackend<C> {
    /// Creates a backend issuing commands over `connection`.
    #[must_use]
    pub fn new(connection: C) -> Self {
        Self { connection, key_fn: None }
    }

    /// Maps cache keys to Redis keys, e.g. to add a namespace prefix.
    ///
    /// **Default**: the cache key is used unchanged
    #[must_use]
    pub fn key_fn(mut self, key_fn: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    fn redis_key(&self, key: &str) -> String {
        self.key_fn.as_ref().map_or_else(|| key.to_string(), |key_fn| key_fn(key))
    }
}

impl<C> fmt::Debug for RedisBackend<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("key_fn", &self.key_fn.is_some())
            .finish_non_exhaustive()
    }
}

impl<C> CacheBackend for RedisBackend<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<Envelope>> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = connection.get(self.redis_key(key)).await.map_err(Error::backend)?;

        match value {
            Some(bytes) => Envelope::decode(Bytes::from(bytes)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, envelope: Envelope, ttl: Duration) -> Result<()> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut connection = self.connection.clone();

        connection
            .pset_ex::<_, _, ()>(self.redis_key(key), envelope.encode().to_vec(), millis)
            .await
            .map_err(Error::backend)
    }
}

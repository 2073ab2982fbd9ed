// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::{Error, Result};

pub(crate) type InFlight<V> = Shared<BoxFuture<'static, Result<V>>>;

type Registry<K, V> = Arc<Mutex<HashMap<K, InFlight<V>>>>;

/// Runs at most one fetch per key at a time.
///
/// The first caller for a key spawns the fetch onto the tokio runtime; every
/// caller arriving while it runs receives a handle to the same outcome. The
/// fetch is detached from its callers, so dropping a handle never cancels it.
/// Once the fetch settles the key is retired and the next caller starts over.
///
/// Clones share the registry.
pub(crate) struct Coalescer<K, V> {
    in_flight: Registry<K, V>,
}

impl<K, V> Coalescer<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            in_flight: Arc::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<K, V> Clone for Coalescer<K, V> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<K, V> fmt::Debug for Coalescer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl<K, V> Coalescer<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Joins the fetch in flight for `key`, or starts one by calling `work`.
    ///
    /// `work` is only called when no fetch is in flight. A fetch that panics
    /// or is dropped by runtime shutdown resolves to an
    /// [`Origin`](crate::ErrorKind::Origin) error. Outside a tokio runtime
    /// nothing is started and the outcome is a
    /// [`Configuration`](crate::ErrorKind::Configuration) error.
    pub(crate) fn run_exclusive<F, Fut>(&self, key: K, work: F) -> InFlight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            return future::ready(Err(Error::configuration("coalesced fetches require a tokio runtime")))
                .boxed()
                .shared();
        };

        let (sender, receiver) = oneshot::channel();
        let outcome = async move {
            match receiver.await {
                Ok(result) => result,
                Err(closed) => Err(Error::origin(format!("origin fetch did not complete: {closed}"))),
            }
        }
        .boxed()
        .shared();

        {
            let mut in_flight = self.in_flight.lock();
            if let Some(existing) = in_flight.get(&key) {
                return existing.clone();
            }
            in_flight.insert(key.clone(), outcome.clone());
        }

        // Spawning may drop the task on the spot, so the registry lock must
        // be released before the guard exists.
        let guard = RetireGuard {
            key,
            in_flight: Arc::clone(&self.in_flight),
        };
        let fetch = work();
        runtime.spawn(async move {
            let result = fetch.await;
            drop(guard);
            let _ = sender.send(result);
        });

        outcome
    }
}

/// Removes the key from the registry when the fetch finishes, panics or is dropped.
struct RetireGuard<K: Hash + Eq, V> {
    key: K,
    in_flight: Registry<K, V>,
}

impl<K: Hash + Eq, V> Drop for RetireGuard<K, V> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use crate::HttpRequest;

/// Derives the cache key of a request.
///
/// The default key is the full request URI.
#[derive(Clone)]
pub(crate) struct KeyFn(Arc<dyn Fn(&HttpRequest) -> String + Send + Sync>);

impl KeyFn {
    pub(crate) fn new<F>(key_fn: F) -> Self
    where
        F: Fn(&HttpRequest) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(key_fn))
    }

    pub(crate) fn call(&self, request: &HttpRequest) -> String {
        (self.0)(request)
    }
}

impl Default for KeyFn {
    fn default() -> Self {
        Self::new(|request| request.uri().to_string())
    }
}

impl fmt::Debug for KeyFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFn").finish()
    }
}

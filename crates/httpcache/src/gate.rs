// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::str::FromStr;
use std::time::Duration;

use http::{HeaderValue, Method};
use jiff::SignedDuration;

use crate::key_fn::KeyFn;
use crate::{CACHE_EXPIRATION_HEADER, Error, HttpRequest, Result};

/// How a single request is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Forward to the origin without touching the cache.
    Bypass,
    /// Serve through the cache.
    Cache(CachePolicy),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CachePolicy {
    pub(crate) key: String,
    pub(crate) ttl: Duration,
}

/// Decides per request whether to cache, under which key and for how long.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestGate {
    pub(crate) default_expiration: Option<Duration>,
    pub(crate) key_fn: KeyFn,
}

impl RequestGate {
    /// Evaluates `request`.
    ///
    /// Only `GET` requests are cached. The expiration header wins over the
    /// default expiration; without either, or with a zero expiration, the
    /// request bypasses the cache. On the caching path the expiration header
    /// is removed so it never reaches the origin.
    pub(crate) fn evaluate(&self, request: &mut HttpRequest) -> Result<Admission> {
        if *request.method() != Method::GET {
            return Ok(Admission::Bypass);
        }

        let header_ttl = request.headers().get(CACHE_EXPIRATION_HEADER).map(parse_expiration).transpose()?;

        let Some(ttl) = header_ttl.or(self.default_expiration) else {
            return Ok(Admission::Bypass);
        };

        if ttl.is_zero() {
            return Ok(Admission::Bypass);
        }

        let key = self.key_fn.call(request);
        request.headers_mut().remove(CACHE_EXPIRATION_HEADER);

        Ok(Admission::Cache(CachePolicy { key, ttl }))
    }
}

/// Parses a duration such as `1h30m0s`, `90s` or `PT1H`.
fn parse_expiration(value: &HeaderValue) -> Result<Duration> {
    let text = value
        .to_str()
        .map_err(|e| Error::configuration(format!("{CACHE_EXPIRATION_HEADER} header is not valid text: {e}")))?;

    let signed = SignedDuration::from_str(text.trim())
        .map_err(|e| Error::configuration(format!("{CACHE_EXPIRATION_HEADER} header {text:?} is not a duration: {e}")))?;

    Duration::try_from(signed).map_err(|e| Error::configuration(format!("{CACHE_EXPIRATION_HEADER} header {text:?} is negative: {e}")))
}

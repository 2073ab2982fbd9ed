// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for the caching decorator.

use std::fmt;

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request carried a malformed cache control header, or a fetch was
    /// attempted outside a tokio runtime.
    Configuration,
    /// The cache backend failed to read or write an entry.
    Backend,
    /// A stored entry could not be decoded.
    Decode,
    /// The wrapped transport failed while fetching from the origin.
    Origin,
}

impl ErrorKind {
    /// Returns a short, stable name for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Backend => "backend",
            Self::Decode => "decode",
            Self::Origin => "origin",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced while serving a request through the cache.
///
/// The error is cheap to clone so that a single failed origin fetch can be
/// handed to every caller that was waiting on it. Use [`Error::kind`] to
/// distinguish failures and [`std::error::Error::source`] to reach the cause.
///
/// # Examples
///
/// ```
/// use httpcache::{Error, ErrorKind};
///
/// let error = Error::origin("connection reset");
/// assert_eq!(error.kind(), ErrorKind::Origin);
/// ```
#[ohno::error]
#[derive(Clone)]
#[display("http cache {kind} error")]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates a configuration error, e.g. for an unparseable expiration header.
    pub fn configuration(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Configuration, cause)
    }

    /// Creates a backend error wrapping an I/O failure of the cache store.
    pub fn backend(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Backend, cause)
    }

    /// Creates a decode error for corrupt cached data.
    pub fn decode(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Decode, cause)
    }

    /// Creates an origin error wrapping a transport failure.
    ///
    /// Transports wrapped by the cache report their failures with this constructor.
    pub fn origin(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Origin, cause)
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

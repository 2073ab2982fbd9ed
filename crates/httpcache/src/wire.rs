// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! HTTP/1.1 serialization of cached responses.

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};

use crate::{Error, HttpResponse, Result};

/// A clonable snapshot of an HTTP response.
///
/// This is the value shared between coalesced callers and, through
/// [`to_bytes`](Self::to_bytes), the payload stored in an
/// [`Envelope`](crate::Envelope).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl CachedResponse {
    /// Captures the status, headers and body of `response`.
    #[must_use]
    pub fn from_response(response: HttpResponse) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// Rebuilds a response from the snapshot.
    #[must_use]
    pub fn into_response(self) -> HttpResponse {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    /// The response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The response body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Writes the response in HTTP/1.1 wire format.
    ///
    /// Every header value is kept, including repeated ones. Any
    /// `content-length` or `transfer-encoding` header is replaced by a
    /// `content-length` matching the body.
    ///
    /// The status line is always `HTTP/1.1` with the canonical reason phrase
    /// of the status code; the HTTP version and reason phrase of the original
    /// response are not preserved.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + self.body.len());

        buf.put_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_str(),
                self.status.canonical_reason().unwrap_or_default()
            )
            .as_bytes(),
        );

        for (name, value) in &self.headers {
            if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
                continue;
            }
            buf.put_slice(name.as_str().as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(format!("{CONTENT_LENGTH}: {}\r\n\r\n", self.body.len()).as_bytes());
        buf.put_slice(&self.body);

        buf.freeze()
    }

    /// Parses a response previously written by [`to_bytes`](Self::to_bytes).
    ///
    /// There is no limit on the number of headers.
    ///
    /// # Errors
    ///
    /// Returns a [`Decode`](crate::ErrorKind::Decode) error when the head is
    /// malformed or incomplete, or when the body length disagrees with the
    /// `content-length` header.
    pub fn parse(bytes: &Bytes) -> Result<Self> {
        let mut raw_headers = vec![httparse::EMPTY_HEADER; header_capacity(bytes)];
        let mut raw = httparse::Response::new(&mut raw_headers);

        let body_offset = match raw.parse(bytes).map_err(Error::decode)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(Error::decode("cached response head is incomplete")),
        };

        let code = raw.code.ok_or_else(|| Error::decode("cached response has no status code"))?;
        let status = StatusCode::from_u16(code).map_err(Error::decode)?;

        let mut headers = HeaderMap::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(Error::decode)?;
            let value = HeaderValue::from_bytes(header.value).map_err(Error::decode)?;
            headers.append(name, value);
        }

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok())
            .ok_or_else(|| Error::decode("cached response has no valid content-length"))?;

        let body = bytes.slice(body_offset..);
        if body.len() != declared {
            return Err(Error::decode(format!(
                "cached response body is {} bytes, expected {declared}",
                body.len()
            )));
        }

        Ok(Self { status, headers, body })
    }
}

/// An upper bound on the header lines in the head of `bytes`.
fn header_capacity(bytes: &[u8]) -> usize {
    let head_len = bytes
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map_or(bytes.len(), |end| end + 4);

    bytes[..head_len].iter().filter(|&&byte| byte == b'\n').count()
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The versioned binary wrapper around a cached response.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// The only envelope format this crate reads and writes.
pub const FORMAT_VERSION: u64 = 1;

// A u64 never needs more than ten 7-bit groups.
const MAX_VARINT_LEN: usize = 10;

/// A cached payload together with the instant it was stored.
///
/// The persisted form is `uvarint(version) || uvarint(unix seconds) || payload`,
/// with both integers in unsigned LEB128. Envelopes are immutable: a newer
/// response replaces the whole envelope.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
///
/// use bytes::Bytes;
/// use httpcache::Envelope;
///
/// let inserted_at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
/// let envelope = Envelope::new(inserted_at, Bytes::from_static(b"payload"));
///
/// let decoded = Envelope::decode(envelope.encode())?.expect("supported version");
/// assert_eq!(decoded, envelope);
/// # Ok::<(), httpcache::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    inserted_at: SystemTime,
    payload: Bytes,
}

impl Envelope {
    /// Creates an envelope for `payload` stored at `inserted_at`.
    #[must_use]
    pub fn new(inserted_at: SystemTime, payload: Bytes) -> Self {
        Self { inserted_at, payload }
    }

    /// The instant the payload was stored.
    #[must_use]
    pub fn inserted_at(&self) -> SystemTime {
        self.inserted_at
    }

    /// The raw serialized response.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consumes the envelope and returns the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Returns `true` while `now` is strictly before `inserted_at + ttl`.
    ///
    /// An expiry instant that cannot be represented never passes.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration, now: SystemTime) -> bool {
        self.inserted_at.checked_add(ttl).is_none_or(|expires_at| expires_at > now)
    }

    /// Serializes the envelope.
    ///
    /// The insertion instant is truncated to whole seconds; instants before
    /// the UNIX epoch are written as the epoch.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let seconds = self.inserted_at.duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());

        let mut buf = BytesMut::with_capacity(2 * MAX_VARINT_LEN + self.payload.len());
        put_uvarint(&mut buf, FORMAT_VERSION);
        put_uvarint(&mut buf, seconds);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Deserializes an envelope.
    ///
    /// Returns `Ok(None)` when the entry was written with a different format
    /// version, so it is treated as absent and rewritten on the next fetch.
    ///
    /// # Errors
    ///
    /// Returns a [`Decode`](crate::ErrorKind::Decode) error when the version or
    /// the insertion instant cannot be read.
    pub fn decode(bytes: Bytes) -> Result<Option<Self>> {
        let (version, version_len) = read_uvarint(&bytes).ok_or_else(|| Error::decode("envelope version is corrupt"))?;
        if version != FORMAT_VERSION {
            return Ok(None);
        }

        let (seconds, seconds_len) =
            read_uvarint(&bytes[version_len..]).ok_or_else(|| Error::decode("envelope insertion time is corrupt"))?;
        let inserted_at = UNIX_EPOCH
            .checked_add(Duration::from_secs(seconds))
            .ok_or_else(|| Error::decode("envelope insertion time is out of range"))?;

        Ok(Some(Self {
            inserted_at,
            payload: bytes.slice(version_len + seconds_len..),
        }))
    }
}

fn put_uvarint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        #[expect(clippy::cast_possible_truncation, reason = "masked to seven bits")]
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    #[expect(clippy::cast_possible_truncation, reason = "value is below 0x80")]
    buf.put_u8(value as u8);
}

/// Reads an unsigned LEB128 integer, returning it with the number of bytes consumed.
///
/// Returns `None` for truncated input or a value that does not fit in a `u64`.
fn read_uvarint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0_u64;
    for (index, &byte) in bytes.iter().enumerate().take(MAX_VARINT_LEN) {
        let group = u64::from(byte & 0x7f);
        if index == MAX_VARINT_LEN - 1 && byte > 1 {
            return None;
        }
        value |= group << (7 * index);
        if byte < 0x80 {
            return Some((value, index + 1));
        }
    }
    None
}

//! Request/response signing with HMAC-SHA256.
//!
//! A signed envelope carries a trailer of three ordinary packed values
//! right after its body:
//!
//! ```text
//! ┌──────────┬──────┬──────┬────────────────────┬──────┬────────────────────┐
//! │ status / │ path │ body │ timestamp (i64)    │ id   │ signature (32 B)   │
//! │ method   │      │      │                    │ str  │ binary             │
//! └──────────┴──────┴──────┴────────────────────┴──────┴────────────────────┘
//! ◀───────────── signed bytes: buffer start .. signature header ──▶
//! ```
//!
//! The MAC covers every byte from the start of the buffer up to (not
//! including) the signature value. Keys are always 512 bits; shorter keys
//! are rejected rather than padded. Crypto is handled by the `hmac-sha256`
//! crate, identical on ESP-IDF and host targets.

use core::cell::Cell;
use core::fmt;
use log::debug;

use super::pack::{Pack, PackError, WORD};

/// Key length in bytes.
pub const KEY_LENGTH: usize = 64;

/// HMAC-SHA256 output length in bytes.
pub const SIGNATURE_LENGTH: usize = 32;

/// Maximum age of a signed request.
pub const FRESHNESS_WINDOW_SECS: i64 = 600;

// ── Key material ─────────────────────────────────────────────

/// A 512-bit signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LENGTH]);

impl Key {
    pub const fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Copy a key from raw bytes. Anything but exactly 64 bytes is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AuthError> {
        let bytes: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| AuthError::InvalidKey)?;
        Ok(Self(bytes))
    }

    /// Decode a key from 128 hex digits (either case).
    pub fn from_hex(hex: &str) -> Result<Self, AuthError> {
        let hex = hex.as_bytes();
        if hex.len() != KEY_LENGTH * 2 {
            return Err(AuthError::InvalidKey);
        }
        let mut bytes = [0u8; KEY_LENGTH];
        for (byte, pair) in bytes.iter_mut().zip(hex.chunks_exact(2)) {
            *byte = (nibble(pair[0])? << 4) | nibble(pair[1])?;
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

fn nibble(digit: u8) -> Result<u8, AuthError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(AuthError::InvalidKey),
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Identity and key used to verify requests and sign responses.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub id: &'a str,
    pub key: &'a Key,
}

// ── Errors ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Trailer missing, out of order, or of the wrong shape.
    Malformed,
    /// Timestamp older than the freshness window.
    Expired,
    /// MAC does not match the signed bytes.
    BadSignature,
    /// Key material is not exactly 64 bytes.
    InvalidKey,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed signature trailer"),
            Self::Expired => write!(f, "signature expired"),
            Self::BadSignature => write!(f, "signature mismatch"),
            Self::InvalidKey => write!(f, "key must be 64 bytes"),
        }
    }
}

impl std::error::Error for AuthError {}

// ── MAC ──────────────────────────────────────────────────────

/// `HMAC-SHA256(key, data)` over a shared buffer view.
pub fn sign(data: &[Cell<u8>], key: &Key) -> [u8; SIGNATURE_LENGTH] {
    let mut mac = hmac_sha256::HMAC::new(key.as_bytes());
    let mut chunk = [0u8; 64];
    for block in data.chunks(chunk.len()) {
        for (dst, src) in chunk.iter_mut().zip(block) {
            *dst = src.get();
        }
        mac.update(&chunk[..block.len()]);
    }
    mac.finalize()
}

/// `HMAC-SHA256(key, data)` over a plain byte slice.
pub fn sign_bytes(data: &[u8], key: &Key) -> [u8; SIGNATURE_LENGTH] {
    hmac_sha256::HMAC::mac(data, key.as_bytes())
}

fn constant_time_eq(a: &[u8; SIGNATURE_LENGTH], b: &[u8; SIGNATURE_LENGTH]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ── Verification ─────────────────────────────────────────────

struct Trailer {
    timestamp: i64,
    signed_length: usize,
    signature: [u8; SIGNATURE_LENGTH],
}

/// Verify the trailer that follows the body.
///
/// `reader` must sit on the request path at the root level. Its position
/// is restored before returning, whatever the outcome. Freshness is
/// checked before the MAC.
pub fn verify(reader: &mut Pack<'_>, key: &Key, now: i64) -> Result<(), AuthError> {
    reader.save_cursor().map_err(|_| AuthError::Malformed)?;
    let trailer = read_trailer(reader);
    reader.restore_cursor().map_err(|_| AuthError::Malformed)?;
    let trailer = trailer?;

    let expected = sign(&reader.buffer()[..trailer.signed_length], key);

    if trailer.timestamp.saturating_add(FRESHNESS_WINDOW_SECS) < now {
        debug!("auth: timestamp {} stale at {}", trailer.timestamp, now);
        return Err(AuthError::Expired);
    }
    if !constant_time_eq(&trailer.signature, &expected) {
        return Err(AuthError::BadSignature);
    }
    Ok(())
}

fn read_trailer(reader: &mut Pack<'_>) -> Result<Trailer, AuthError> {
    // body
    if !reader.next() {
        return Err(AuthError::Malformed);
    }

    if !(reader.next() && reader.is_integer()) {
        return Err(AuthError::Malformed);
    }
    let timestamp = reader.get_big_integer().map_err(|_| AuthError::Malformed)?;
    if timestamp == 0 {
        return Err(AuthError::Malformed);
    }

    if !(reader.next() && reader.is_string()) {
        return Err(AuthError::Malformed);
    }

    if !(reader.next() && reader.is_binary()) {
        return Err(AuthError::Malformed);
    }
    let signed_length = reader.cursor().element_start * WORD;
    let mut signature = [0u8; SIGNATURE_LENGTH];
    match reader.get_binary(&mut signature) {
        Ok(SIGNATURE_LENGTH) => {}
        _ => return Err(AuthError::Malformed),
    }

    Ok(Trailer {
        timestamp,
        signed_length,
        signature,
    })
}

// ── Signing ──────────────────────────────────────────────────

/// Append `[now, id, HMAC]` at the writer's position. The MAC covers the
/// buffer from its first byte up to the signature value.
pub fn put_signature(
    writer: &mut Pack<'_>,
    now: i64,
    credentials: Credentials<'_>,
) -> Result<(), PackError> {
    writer.put_big_integer(now)?;
    writer.put_string(credentials.id)?;
    let signed_length = writer.cursor().element_start * WORD;
    let mac = sign(&writer.buffer()[..signed_length], credentials.key);
    writer.put_binary(&mac)
}

//! Client side of the envelope: building requests and reading responses.
//!
//! Used by host tools and tests to talk to a device, and by the firmware
//! itself when it calls out to a backend.

use super::auth::{self, AuthError, Credentials, Key};
use super::engine::{Method, Status};
use super::pack::{self, Kind, Pack, PackError, WORD};
use super::value::Value;

/// One element of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment<'a> {
    Name(&'a str),
    Index(i32),
}

/// Encode `[method<<24 | token] [path] [body]` into `buffer`, signing it
/// when `signer` is given. Returns the request length in bytes.
pub fn write_request<F>(
    buffer: &mut [u8],
    method: Method,
    token: u32,
    path: &[PathSegment<'_>],
    body: F,
    signer: Option<(i64, Credentials<'_>)>,
) -> Result<usize, PackError>
where
    F: FnOnce(&mut Pack<'_>) -> Result<(), PackError>,
{
    let buf = pack::cells(buffer);
    let mut writer = Pack::new(buf, buf.len() / WORD);
    let word = (u32::from(method.code()) << 24) | (token & 0x00FF_FFFF);
    writer.put_integer(word as i32)?;
    writer.create_container(Kind::List)?;
    for segment in path {
        match segment {
            PathSegment::Name(name) => writer.put_string(name)?,
            PathSegment::Index(index) => writer.put_integer(*index)?,
        }
    }
    writer.finish_container()?;
    body(&mut writer)?;
    if let Some((now, credentials)) = signer {
        auth::put_signature(&mut writer, now, credentials)?;
    }
    Ok(writer.offset() * WORD)
}

/// Status and token from the first word of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: Status,
    pub token: u32,
}

pub fn read_response_head(response: &[u8]) -> Result<ResponseHead, PackError> {
    let word = |i: usize| -> Result<u32, PackError> {
        response
            .get(i * WORD..(i + 1) * WORD)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or(PackError::Truncated)
    };
    if word(0)? != Kind::Integer.tag() | 1 {
        return Err(PackError::WrongKind);
    }
    let value = word(1)?;
    let status = Status::from_code((value >> 24) as u8).ok_or(PackError::WrongKind)?;
    Ok(ResponseHead {
        status,
        token: value & 0x00FF_FFFF,
    })
}

/// A fully decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: Status,
    pub token: u32,
    pub path: Value,
    pub body: Option<Value>,
    /// `(timestamp, id)` of the signature trailer, if one follows the body.
    pub signed_by: Option<(i64, String)>,
}

/// Decode a response envelope. Error responses carry only the head, in
/// which case `path` is an empty list and `body` is `None`.
pub fn read_response(buffer: &mut [u8], length: usize) -> Result<Response, PackError> {
    let head = read_response_head(&buffer[..length.min(buffer.len())])?;
    let buf = pack::cells(buffer);
    let mut reader = Pack::new(buf, length / WORD);
    reader.next();

    let mut response = Response {
        status: head.status,
        token: head.token,
        path: Value::List(Vec::new()),
        body: None,
        signed_by: None,
    };
    if !reader.next() {
        return Ok(response);
    }
    response.path = Value::read_from(&mut reader)?;
    if reader.next() {
        response.body = Some(Value::read_from(&mut reader)?);
    }
    if reader.next() && reader.is_integer() {
        let timestamp = reader.get_big_integer()?;
        if !(reader.next() && reader.is_string()) {
            return Err(PackError::Truncated);
        }
        let mut id = [0u8; 64];
        let length = reader.get_string(&mut id)?;
        let id = core::str::from_utf8(&id[..length]).map_err(|_| PackError::InvalidUtf8)?;
        response.signed_by = Some((timestamp, id.into()));
    }
    Ok(response)
}

/// Check the signature trailer of a response.
pub fn verify_response(
    buffer: &mut [u8],
    length: usize,
    key: &Key,
    now: i64,
) -> Result<(), AuthError> {
    let buf = pack::cells(buffer);
    let mut reader = Pack::new(buf, length / WORD);
    if !(reader.next() && reader.next()) {
        return Err(AuthError::Malformed);
    }
    auth::verify(&mut reader, key, now)
}

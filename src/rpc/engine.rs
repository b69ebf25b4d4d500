//! Resource dispatcher ("postman").
//!
//! Requests and responses share one caller-owned buffer:
//!
//! ```text
//! request:  [method<<24 | token] [path list] [body] [timestamp id signature]?
//! response: [status<<24 | token] [path list] [body] [timestamp id signature]?
//! error:    [status<<24 | token]
//! ```
//!
//! The response body is written right after the request path, so the path
//! is echoed back untouched. Every request passes through the same gates:
//!
//! 1. **Envelope**: a nonzero 32-bit method token followed by a path list.
//! 2. **Signature**: only when credentials are configured (see [`auth`]).
//! 3. **Routing**: the root path segment selects a registered [`Resource`].
//!
//! The postman holds no per-request state, so one instance can serve every
//! transport as long as calls are not interleaved on the same buffer.

use log::{debug, warn};

use super::auth::{self, AuthError, Credentials};
use super::pack::{self, Kind, Pack, PackError, WORD};

/// Maximum number of registered resources.
pub const MAX_RESOURCES: usize = 16;

/// Size of the buffer every transport hands to the postman.
pub const PACKET_LENGTH_MAX: usize = 9 * 1024;

const TOKEN_MASK: u32 = 0x00FF_FFFF;

// ── Methods and statuses ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Method {
    Get = 0x01,
    Post = 0x02,
    Put = 0x03,
    Delete = 0x04,
}

impl Method {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Get),
            0x02 => Some(Self::Post),
            0x03 => Some(Self::Put),
            0x04 => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Response status, REST-like codes squeezed into one byte
/// (`0x25` reads as 2.05).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x20,
    Created = 0x21,
    Deleted = 0x22,
    Changed = 0x24,
    Content = 0x25,
    BadRequest = 0x40,
    Unauthorized = 0x41,
    Forbidden = 0x43,
    NotFound = 0x44,
    MethodNotAllowed = 0x45,
    Timeout = 0x48,
    RequestEntityTooLarge = 0x4D,
    InternalServerError = 0x50,
}

impl Status {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x20 => Some(Self::Ok),
            0x21 => Some(Self::Created),
            0x22 => Some(Self::Deleted),
            0x24 => Some(Self::Changed),
            0x25 => Some(Self::Content),
            0x40 => Some(Self::BadRequest),
            0x41 => Some(Self::Unauthorized),
            0x43 => Some(Self::Forbidden),
            0x44 => Some(Self::NotFound),
            0x45 => Some(Self::MethodNotAllowed),
            0x48 => Some(Self::Timeout),
            0x4D => Some(Self::RequestEntityTooLarge),
            0x50 => Some(Self::InternalServerError),
            _ => None,
        }
    }

    pub const fn is_error(self) -> bool {
        self.code() >= Self::BadRequest.code()
    }
}

impl From<AuthError> for Status {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Malformed => Self::BadRequest,
            AuthError::Expired => Self::Timeout,
            AuthError::BadSignature => Self::Forbidden,
            AuthError::InvalidKey => Self::InternalServerError,
        }
    }
}

/// First word of a response: status in the top byte, request token below.
pub const fn status_word(status: Status, token: u32) -> i32 {
    (((status.code() as u32) << 24) | (token & TOKEN_MASK)) as i32
}

// ── Resources ────────────────────────────────────────────────

/// A handler reachable through the first path segment.
///
/// `reader` is inside the request path, positioned on the root segment:
/// `next` yields further path elements, `close` followed by `next` selects
/// the request body. `writer` sits where the response body goes and must
/// be left at the root level.
pub trait Resource {
    fn handle(&mut self, method: Method, reader: &mut Pack<'_>, writer: &mut Pack<'_>) -> Status;
}

struct FnResource<F>(F);

impl<F> Resource for FnResource<F>
where
    F: FnMut(Method, &mut Pack<'_>, &mut Pack<'_>) -> Status,
{
    fn handle(&mut self, method: Method, reader: &mut Pack<'_>, writer: &mut Pack<'_>) -> Status {
        (self.0)(method, reader, writer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// All [`MAX_RESOURCES`] slots are taken.
    Full,
}

impl core::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "resource table full ({MAX_RESOURCES} entries)"),
        }
    }
}

impl std::error::Error for RegistryError {}

struct Registration {
    path: &'static str,
    resource: Box<dyn Resource>,
}

// ── Postman ──────────────────────────────────────────────────

/// Append-only resource table plus the request/response algorithm.
pub struct Postman {
    resources: heapless::Vec<Registration, MAX_RESOURCES>,
}

impl Postman {
    pub fn new() -> Self {
        Self {
            resources: heapless::Vec::new(),
        }
    }

    pub fn register<R>(&mut self, path: &'static str, resource: R) -> Result<(), RegistryError>
    where
        R: Resource + 'static,
    {
        let registration = Registration {
            path,
            resource: Box::new(resource),
        };
        self.resources
            .push(registration)
            .map_err(|_| RegistryError::Full)?;
        debug!("postman: registered /{}", path);
        Ok(())
    }

    /// Register a closure as a resource.
    pub fn register_fn<F>(&mut self, path: &'static str, handler: F) -> Result<(), RegistryError>
    where
        F: FnMut(Method, &mut Pack<'_>, &mut Pack<'_>) -> Status + 'static,
    {
        self.register(path, FnResource(handler))
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.iter().map(|r| r.path)
    }

    /// Handle the request held in the first `length` bytes of `buffer` and
    /// write the response over it. Returns the response length in bytes,
    /// which is never less than one status word for buffers of at least
    /// two words.
    ///
    /// With `credentials`, requests must carry a valid, fresh signature
    /// trailer and successful responses are signed in turn.
    pub fn handle(
        &mut self,
        buffer: &mut [u8],
        length: usize,
        now: i64,
        credentials: Option<Credentials<'_>>,
    ) -> usize {
        let buf = pack::cells(buffer);
        let mut reader = Pack::new(buf, length / WORD);
        let mut writer = Pack::new(buf, buf.len() / WORD);

        let method_token = read_method_token(&mut reader);
        let token = method_token.unwrap_or(0);
        let mut signer = None;
        let mut status = match method_token {
            Some(token) if locate_body(&mut reader, &mut writer) => {
                match self.route(token, &mut reader, &mut writer, now, credentials) {
                    Ok((status, verified)) => {
                        signer = credentials.filter(|_| verified);
                        status
                    }
                    Err(status) => status,
                }
            }
            _ => Status::BadRequest,
        };

        if !status.is_error() {
            status = finish_response(&mut writer, status, token, now, signer);
        }

        if status.is_error() {
            warn!("postman: token {:06X} -> {:?}", token & TOKEN_MASK, status);
            writer.reset_cursor();
            let reset = writer
                .set_offset(0)
                .and_then(|()| writer.put_integer(status_word(status, token)));
            if reset.is_err() {
                return 0;
            }
        } else {
            debug!("postman: token {:06X} -> {:?}", token & TOKEN_MASK, status);
        }

        writer.offset() * WORD
    }

    /// Authenticate and route. `Ok` carries the handler's status and
    /// whether the request signature was verified.
    fn route(
        &mut self,
        token: u32,
        reader: &mut Pack<'_>,
        writer: &mut Pack<'_>,
        now: i64,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(Status, bool), Status> {
        let verified = match credentials {
            Some(credentials) => {
                if let Err(e) = auth::verify(reader, credentials.key, now) {
                    warn!("postman: {}", e);
                    return Err(e.into());
                }
                true
            }
            None => false,
        };

        let code = (token >> 24) as u8;
        let status = if reader.is_empty() {
            if code == Method::Get.code() {
                self.write_index(writer)
            } else {
                Status::MethodNotAllowed
            }
        } else {
            self.dispatch(code, reader, writer)
        };
        Ok((status, verified))
    }

    fn dispatch(&mut self, code: u8, reader: &mut Pack<'_>, writer: &mut Pack<'_>) -> Status {
        if reader.open().is_err() {
            return Status::InternalServerError;
        }
        // Root segment must be a string.
        if !reader.next() || !reader.is_string() {
            return Status::NotFound;
        }
        let Some(registration) = self.resources.iter_mut().find(|r| reader.equals(r.path)) else {
            return Status::NotFound;
        };
        let Some(method) = Method::from_code(code) else {
            return Status::MethodNotAllowed;
        };
        registration.resource.handle(method, reader, writer)
    }

    fn write_index(&self, writer: &mut Pack<'_>) -> Status {
        match put_path_list(writer, self.paths()) {
            Ok(()) => Status::Content,
            Err(e) => {
                warn!("postman: resource index does not fit: {}", e);
                Status::InternalServerError
            }
        }
    }
}

impl Default for Postman {
    fn default() -> Self {
        Self::new()
    }
}

fn read_method_token(reader: &mut Pack<'_>) -> Option<u32> {
    if !(reader.next() && reader.is_integer() && reader.content_length() == 1) {
        return None;
    }
    let token = reader.get_integer().ok()? as u32;
    (token != 0).then_some(token)
}

/// Select the path and move the writer just past it.
fn locate_body(reader: &mut Pack<'_>, writer: &mut Pack<'_>) -> bool {
    if !(reader.next() && reader.is_list()) {
        return false;
    }
    writer
        .set_offset(reader.offset() + reader.element_length())
        .is_ok()
}

/// Patch the status word over the method word, then append the
/// signature trailer when the request was verified.
fn finish_response(
    writer: &mut Pack<'_>,
    status: Status,
    token: u32,
    now: i64,
    signer: Option<Credentials<'_>>,
) -> Status {
    if writer.depth() != 0 {
        warn!("postman: handler left {} container(s) open", writer.depth());
        return Status::InternalServerError;
    }
    if let Err(e) = patch_status(writer, status, token) {
        warn!("postman: cannot write status word: {}", e);
        return Status::InternalServerError;
    }
    if let Some(credentials) = signer {
        if let Err(e) = auth::put_signature(writer, now, credentials) {
            warn!("postman: cannot sign response: {}", e);
            return Status::InternalServerError;
        }
    }
    status
}

/// Overwrite the first word, keeping the writer's position.
fn patch_status(writer: &mut Pack<'_>, status: Status, token: u32) -> Result<(), PackError> {
    writer.save_cursor()?;
    let patched = writer
        .set_offset(0)
        .and_then(|()| writer.put_integer(status_word(status, token)));
    writer.restore_cursor()?;
    patched
}

fn put_path_list<'p>(
    writer: &mut Pack<'_>,
    paths: impl Iterator<Item = &'p str>,
) -> Result<(), PackError> {
    writer.create_container(Kind::List)?;
    for path in paths {
        writer.put_string(path)?;
    }
    writer.finish_container()
}

/// Build an unsolicited `2.05 Content` message for `path` with token 0,
/// e.g. to push measurements. Returns its length in bytes.
pub fn build_notification<F>(
    buffer: &mut [u8],
    path: &str,
    body: F,
    now: i64,
    credentials: Option<Credentials<'_>>,
) -> Result<usize, PackError>
where
    F: FnOnce(&mut Pack<'_>) -> Result<(), PackError>,
{
    let buf = pack::cells(buffer);
    let mut writer = Pack::new(buf, buf.len() / WORD);
    writer.put_integer(status_word(Status::Content, 0))?;
    put_path_list(&mut writer, core::iter::once(path))?;
    body(&mut writer)?;
    if let Some(credentials) = credentials {
        auth::put_signature(&mut writer, now, credentials)?;
    }
    Ok(writer.offset() * WORD)
}

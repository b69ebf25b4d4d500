//! Transport abstraction and the serial request loop.
//!
//! Concrete implementations:
//! - UART serial (console UART on the ESP32-S3), see `adapters::serial`
//! - in-memory loopbacks in the integration tests
//!
//! [`SerialLink`] ties a byte transport, a [`Framer`] and the packet
//! buffer together: every complete frame is handed to the [`Postman`]
//! and the response is framed back onto the same transport.

use log::{debug, warn};

use super::codec::Framer;
use super::engine::Postman;

/// Byte-oriented transport channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data` to the transport.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

const READ_CHUNK: usize = 64;
const WRITE_CHUNK: usize = 64;

/// Serial request/response loop. Serial requests are not signed: the
/// link is the device console and assumed to be physically controlled.
pub struct SerialLink<'b, T: Transport> {
    transport: T,
    framer: Framer,
    buffer: &'b mut [u8],
}

impl<'b, T: Transport> SerialLink<'b, T> {
    /// `buffer` receives request payloads and holds the response while it
    /// is sent; its length caps the frame size.
    pub fn new(transport: T, buffer: &'b mut [u8]) -> Self {
        Self {
            transport,
            framer: Framer::new(),
            buffer,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The packet buffer, e.g. to build a notification before [`send`](Self::send).
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut *self.buffer
    }

    /// Read whatever the transport has and serve every complete request
    /// in it. Returns whether at least one request was handled.
    pub fn poll(&mut self, postman: &mut Postman, now: i64) -> Result<bool, T::Error> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut chunk)?;
        let mut served = false;
        for &byte in &chunk[..n] {
            let Some(length) = self.framer.receive(&mut *self.buffer, byte) else {
                continue;
            };
            debug!("serial: request of {} bytes", length);
            let response = postman.handle(&mut *self.buffer, length, now, None);
            self.send(response)?;
            served = true;
        }
        Ok(served)
    }

    /// Frame and write the first `length` bytes of the packet buffer.
    pub fn send(&mut self, length: usize) -> Result<(), T::Error> {
        self.framer.start_sending(length);
        let mut out = [0u8; WRITE_CHUNK];
        let mut filled = 0;
        while let Some(byte) = self.framer.transmit(&*self.buffer) {
            out[filled] = byte;
            filled += 1;
            if filled == out.len() {
                write_all(&mut self.transport, &out)?;
                filled = 0;
            }
        }
        write_all(&mut self.transport, &out[..filled])?;
        self.transport.flush()
    }
}

fn write_all<T: Transport>(transport: &mut T, mut data: &[u8]) -> Result<(), T::Error> {
    while !data.is_empty() {
        let n = transport.write(data)?;
        if n == 0 {
            warn!("serial: transport accepted no bytes, dropping {} bytes", data.len());
            return Ok(());
        }
        data = &data[n..];
    }
    Ok(())
}

//! Byte-stuffed serial framing with a CRC-32 trailer.
//!
//! Wire format:
//! ```text
//! ┌──────┬───────────────────────────┬─────────────────┬──────┐
//! │ 0x7E │ payload (escaped)         │ CRC-32 LE (esc.) │ 0x7E │
//! └──────┴───────────────────────────┴─────────────────┴──────┘
//! ```
//!
//! `0x7E` and `0x7D` inside the frame are sent as `0x7D, byte ^ 0x20`.
//! The CRC is the standard reflected CRC-32 over the unescaped payload;
//! running it over payload and trailer together leaves [`CRC_RESIDUE`].
//!
//! [`Framer`] works one byte at a time on a caller-owned buffer and is
//! half duplex: it either receives or sends. [`encode_frame`] and
//! [`FrameDecoder`] are the slice-at-a-time equivalents for hosts and
//! tests.

use log::debug;

/// Frame delimiter.
pub const DELIMITER: u8 = 0x7E;

/// Escape prefix.
pub const ESCAPE: u8 = 0x7D;

/// Escaped bytes are XORed with this value.
pub const ESCAPE_XOR: u8 = 0x20;

/// CRC register after a payload followed by its own little-endian CRC.
pub const CRC_RESIDUE: u32 = 0x2144_DF1C;

/// Bytes of CRC trailer in every frame.
pub const CRC_LENGTH: usize = 4;

const CRC_NIBBLE_TABLE: [u32; 16] = [
    0x0000_0000, 0x1DB7_1064, 0x3B6E_20C8, 0x26D9_30AC, 0x76DC_4190, 0x6B6B_51F4, 0x4DB2_6158,
    0x5005_713C, 0xEDB8_8320, 0xF00F_9344, 0xD6D6_A3E8, 0xCB61_B38C, 0x9B64_C2B0, 0x86D3_D2D4,
    0xA00A_E278, 0xBDBD_F21C,
];

/// Feed one byte into a running CRC-32. Start from 0.
pub const fn crc32_update(crc: u32, byte: u8) -> u32 {
    let mut crc = !crc;
    crc = CRC_NIBBLE_TABLE[((crc ^ byte as u32) & 0x0F) as usize] ^ (crc >> 4);
    crc = CRC_NIBBLE_TABLE[((crc ^ (byte >> 4) as u32) & 0x0F) as usize] ^ (crc >> 4);
    !crc
}

pub fn crc32(data: &[u8]) -> u32 {
    data.iter().fold(0, |crc, &b| crc32_update(crc, b))
}

const fn needs_escape(byte: u8) -> bool {
    byte == DELIMITER || byte == ESCAPE
}

// ── Byte-at-a-time framer ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    Receiving,
    Sending,
}

/// Half-duplex frame state machine.
///
/// Receiving stores unescaped payload bytes in the caller's buffer. The
/// four CRC bytes at the end of a frame only feed the CRC register, so a
/// buffer of `n` bytes accepts payloads of up to `n` bytes; longer frames
/// are dropped whole. Sending reads the payload back out of the buffer and
/// appends the trailer from an internal latch.
#[derive(Debug, Clone)]
pub struct Framer {
    state: FramerState,
    crc: u32,
    index: usize,
    length: usize,
    escape: bool,
    started: bool,
    overflow: bool,
    trailer: [u8; CRC_LENGTH],
}

impl Framer {
    pub const fn new() -> Self {
        Self {
            state: FramerState::Receiving,
            crc: 0,
            index: 0,
            length: 0,
            escape: false,
            started: false,
            overflow: false,
            trailer: [0; CRC_LENGTH],
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Drop any partial frame and go back to receiving.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn enter(&mut self, state: FramerState) {
        self.state = state;
        self.crc = 0;
        self.index = 0;
        self.escape = false;
        self.started = false;
        self.overflow = false;
    }

    /// Feed one received byte. On a closing delimiter that ends a frame
    /// with a good CRC, returns the payload length; the payload is then in
    /// `buffer[..len]`.
    ///
    /// Bytes arriving while sending are ignored.
    pub fn receive(&mut self, buffer: &mut [u8], byte: u8) -> Option<usize> {
        if self.state != FramerState::Receiving {
            return None;
        }
        match byte {
            DELIMITER => {
                let valid = !self.overflow && self.index >= CRC_LENGTH && self.crc == CRC_RESIDUE;
                let length = self.index.saturating_sub(CRC_LENGTH);
                if !valid && self.index > 0 {
                    if self.overflow {
                        debug!("framer: dropped oversized frame");
                    } else {
                        debug!("framer: dropped frame ({} bytes, bad CRC)", self.index);
                    }
                }
                self.enter(FramerState::Receiving);
                valid.then_some(length)
            }
            ESCAPE => {
                self.escape = true;
                None
            }
            _ => {
                let value = if self.escape { byte ^ ESCAPE_XOR } else { byte };
                self.escape = false;
                if self.index >= buffer.len() + CRC_LENGTH {
                    self.overflow = true;
                    return None;
                }
                self.crc = crc32_update(self.crc, value);
                if let Some(slot) = buffer.get_mut(self.index) {
                    *slot = value;
                }
                self.index += 1;
                None
            }
        }
    }

    /// Switch to sending the first `length` bytes of the buffer.
    pub fn start_sending(&mut self, length: usize) {
        self.enter(FramerState::Sending);
        self.length = length;
    }

    /// Next byte to put on the wire, or `None` once the closing delimiter
    /// has gone out and the framer is receiving again.
    pub fn transmit(&mut self, buffer: &[u8]) -> Option<u8> {
        if self.state != FramerState::Sending {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(DELIMITER);
        }
        let length = self.length.min(buffer.len());
        if self.index == length + CRC_LENGTH {
            self.enter(FramerState::Receiving);
            return Some(DELIMITER);
        }
        if self.index == length && !self.escape {
            self.trailer = self.crc.to_le_bytes();
        }

        let value = if self.index < length {
            buffer[self.index]
        } else {
            self.trailer[self.index - length]
        };
        if self.escape {
            self.escape = false;
            self.advance_sent(value, length);
            return Some(value ^ ESCAPE_XOR);
        }
        if needs_escape(value) {
            self.escape = true;
            return Some(ESCAPE);
        }
        self.advance_sent(value, length);
        Some(value)
    }

    fn advance_sent(&mut self, value: u8, length: usize) {
        if self.index < length {
            self.crc = crc32_update(self.crc, value);
        }
        self.index += 1;
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Slice helpers ────────────────────────────────────────────

/// Encode `payload` as one complete frame into `out`.
///
/// Returns the number of bytes written, or `None` if `out` is too small.
/// `out` needs at most `2 * (payload.len() + 4) + 2` bytes.
pub fn encode_frame(payload: &[u8], out: &mut [u8]) -> Option<usize> {
    let crc = crc32(payload).to_le_bytes();
    let mut written = 0;
    let mut push = |byte: u8| -> Option<()> {
        *out.get_mut(written)? = byte;
        written += 1;
        Some(())
    };

    push(DELIMITER)?;
    for &byte in payload.iter().chain(crc.iter()) {
        if needs_escape(byte) {
            push(ESCAPE)?;
            push(byte ^ ESCAPE_XOR)?;
        } else {
            push(byte)?;
        }
    }
    push(DELIMITER)?;
    Some(written)
}

/// Streaming frame decoder with its own `N`-byte payload buffer.
pub struct FrameDecoder<const N: usize> {
    framer: Framer,
    buffer: [u8; N],
}

impl<const N: usize> FrameDecoder<N> {
    pub const fn new() -> Self {
        Self {
            framer: Framer::new(),
            buffer: [0; N],
        }
    }

    /// Feed one byte. Returns the payload when it completes a valid frame.
    /// The slice is valid until the next call.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        let length = self.framer.receive(&mut self.buffer, byte)?;
        Some(&self.buffer[..length])
    }

    /// Feed bytes until the first complete frame and return it with the
    /// number of input bytes consumed. Remaining input should be fed on the
    /// next call.
    pub fn feed(&mut self, data: &[u8]) -> (usize, Option<&[u8]>) {
        for (i, &byte) in data.iter().enumerate() {
            if let Some(length) = self.framer.receive(&mut self.buffer, byte) {
                return (i + 1, Some(&self.buffer[..length]));
            }
        }
        (data.len(), None)
    }

    /// Drop any partial frame (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.framer.reset();
    }
}

impl<const N: usize> Default for FrameDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

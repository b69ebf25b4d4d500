//! Packed-value codec.
//!
//! A packed value is a run of 32-bit little-endian words. The first word
//! carries a type tag in its top nibble and the content length (in words)
//! in the low 28 bits:
//!
//! ```text
//!  31    28 27                                  0
//! ┌────────┬─────────────────────────────────────┐
//! │  tag   │        content length (words)       │  header word
//! ├────────┴─────────────────────────────────────┤
//! │                content words ...             │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! [`Pack`] walks a caller-owned buffer with a bounded stack of
//! [`Cursor`]s. Reading and writing share the same cursor model, so a
//! reader and a writer can operate on one buffer at the same time: the
//! buffer is viewed as `&[Cell<u8>]` and every word is (de)serialised
//! explicitly. Nothing here allocates.

use core::cell::Cell;
use core::fmt;

/// Size of one wire word in bytes.
pub const WORD: usize = 4;

/// Depth of the cursor stack, root level included.
pub const MAX_CURSOR_LEVELS: usize = 4;

pub const TYPE_MASK: u32 = 0xF000_0000;
pub const TYPE_GROUP_MASK: u32 = 0xE000_0000;
pub const BOOLEAN_MASK: u32 = 0x1000_0000;
pub const LENGTH_MASK: u32 = 0x0FFF_FFFF;

/// View a mutable byte buffer as shared cells so several [`Pack`]s can
/// address it at once.
pub fn cells(buffer: &mut [u8]) -> &[Cell<u8>] {
    Cell::from_mut(buffer).as_slice_of_cells()
}

// ── Type tags ────────────────────────────────────────────────

/// Type tag of a packed value (top nibble of its header word).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Kind {
    False = 0x0000_0000,
    True = 0x1000_0000,
    None = 0x2000_0000,
    Integer = 0x4000_0000,
    Float = 0x5000_0000,
    List = 0x8000_0000,
    Map = 0x9000_0000,
    String = 0xC000_0000,
    Binary = 0xD000_0000,
}

impl Kind {
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Decode the tag of a header word. Unassigned tags yield `None`.
    pub const fn from_header(header: u32) -> Option<Self> {
        match header & TYPE_MASK {
            0x0000_0000 => Some(Self::False),
            0x1000_0000 => Some(Self::True),
            0x2000_0000 => Some(Self::None),
            0x4000_0000 => Some(Self::Integer),
            0x5000_0000 => Some(Self::Float),
            0x8000_0000 => Some(Self::List),
            0x9000_0000 => Some(Self::Map),
            0xC000_0000 => Some(Self::String),
            0xD000_0000 => Some(Self::Binary),
            _ => None,
        }
    }

    pub const fn is_container(self) -> bool {
        matches!(self, Self::List | Self::Map)
    }
}

// ── Errors ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackError {
    /// Not enough room left in the enclosing container or buffer.
    BufferFull,
    /// Cursor stack is already at its deepest level.
    StackOverflow,
    /// Tried to leave the root level.
    StackUnderflow,
    /// Offset lies outside the current container or the root buffer.
    OutOfBounds,
    /// Current element has the wrong type for the operation.
    WrongKind,
    /// Destination too small, or a length field is out of range.
    InvalidLength,
    /// String content is not UTF-8.
    InvalidUtf8,
    /// Element header claims more words than its container holds.
    Truncated,
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferFull => write!(f, "buffer full"),
            Self::StackOverflow => write!(f, "cursor stack overflow"),
            Self::StackUnderflow => write!(f, "cursor stack underflow"),
            Self::OutOfBounds => write!(f, "offset out of bounds"),
            Self::WrongKind => write!(f, "unexpected value kind"),
            Self::InvalidLength => write!(f, "invalid length"),
            Self::InvalidUtf8 => write!(f, "string is not UTF-8"),
            Self::Truncated => write!(f, "truncated element"),
        }
    }
}

impl std::error::Error for PackError {}

// ── Cursor ───────────────────────────────────────────────────

/// One level of the cursor stack. All fields are absolute word indices
/// into the root buffer.
///
/// `element_length` of 0 means "no current element": the cursor sits in
/// front of `element_start`, which is where the next write lands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub parent_start: usize,
    pub parent_length: usize,
    pub element_start: usize,
    pub element_length: usize,
}

impl Cursor {
    const fn parent_end(&self) -> usize {
        self.parent_start + self.parent_length
    }
}

// ── Pack ─────────────────────────────────────────────────────

/// A read/write cursor stack over a word buffer.
pub struct Pack<'a> {
    buffer: &'a [Cell<u8>],
    stack: [Cursor; MAX_CURSOR_LEVELS],
    /// Levels pushed by `create_container`; only those may be finished.
    created: [bool; MAX_CURSOR_LEVELS],
    depth: usize,
}

impl<'a> Pack<'a> {
    /// Attach to `buffer`, treating its first `length` words as the root
    /// container. `length` is clamped to the whole words the buffer holds.
    pub fn new(buffer: &'a [Cell<u8>], length: usize) -> Self {
        let length = length.min(buffer.len() / WORD);
        let mut stack = [Cursor::default(); MAX_CURSOR_LEVELS];
        stack[0].parent_length = length;
        Self {
            buffer,
            stack,
            created: [false; MAX_CURSOR_LEVELS],
            depth: 0,
        }
    }

    /// The shared byte view this pack operates on.
    pub(crate) fn buffer(&self) -> &'a [Cell<u8>] {
        self.buffer
    }

    /// Current stack level, 0 being the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn cursor(&self) -> &Cursor {
        &self.stack[self.depth]
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.stack[self.depth]
    }

    // ── Word access ──────────────────────────────────────────

    fn word(&self, index: usize) -> u32 {
        let base = index * WORD;
        match self.buffer.get(base..base + WORD) {
            Some(b) => u32::from_le_bytes([b[0].get(), b[1].get(), b[2].get(), b[3].get()]),
            None => 0,
        }
    }

    fn set_word(&self, index: usize, value: u32) {
        let base = index * WORD;
        if let Some(bytes) = self.buffer.get(base..base + WORD) {
            for (cell, byte) in bytes.iter().zip(value.to_le_bytes()) {
                cell.set(byte);
            }
        }
    }

    fn header(&self) -> Option<u32> {
        let cursor = self.cursor();
        (cursor.element_length > 0).then(|| self.word(cursor.element_start))
    }

    // ── Queries ──────────────────────────────────────────────

    /// Type of the current element, or `None` when no element is selected.
    pub fn kind(&self) -> Option<Kind> {
        self.header().and_then(Kind::from_header)
    }

    /// Words occupied by the current element, header included.
    pub fn element_length(&self) -> usize {
        self.cursor().element_length
    }

    /// Content words of the current element.
    pub fn content_length(&self) -> usize {
        self.cursor().element_length.saturating_sub(1)
    }

    fn group_is(&self, group: Kind) -> bool {
        self.header()
            .is_some_and(|h| h & TYPE_GROUP_MASK == group.tag())
    }

    pub fn is_none(&self) -> bool {
        self.kind() == Some(Kind::None)
    }

    pub fn is_integer(&self) -> bool {
        self.kind() == Some(Kind::Integer)
    }

    pub fn is_float(&self) -> bool {
        self.kind() == Some(Kind::Float)
    }

    pub fn is_string(&self) -> bool {
        self.kind() == Some(Kind::String)
    }

    pub fn is_binary(&self) -> bool {
        self.kind() == Some(Kind::Binary)
    }

    pub fn is_list(&self) -> bool {
        self.kind() == Some(Kind::List)
    }

    pub fn is_map(&self) -> bool {
        self.kind() == Some(Kind::Map)
    }

    /// True or False.
    pub fn is_boolean(&self) -> bool {
        self.group_is(Kind::False)
    }

    /// Integer or Float.
    pub fn is_number(&self) -> bool {
        self.group_is(Kind::Integer)
    }

    /// String or Binary.
    pub fn is_block(&self) -> bool {
        self.group_is(Kind::String)
    }

    /// List or Map.
    pub fn is_container(&self) -> bool {
        self.group_is(Kind::List)
    }

    /// A container holding no elements.
    pub fn is_empty(&self) -> bool {
        self.is_container() && self.cursor().element_length == 1
    }

    /// Words left between the cursor and the end of the enclosing container.
    pub fn free_space(&self) -> usize {
        let cursor = self.cursor();
        cursor.parent_end().saturating_sub(cursor.element_start)
    }

    /// Position of the current element relative to its container.
    pub fn offset(&self) -> usize {
        let cursor = self.cursor();
        cursor.element_start - cursor.parent_start
    }

    /// Jump to `offset` words into the current container. The offset must
    /// lie inside both the container and the root buffer.
    pub fn set_offset(&mut self, offset: usize) -> Result<(), PackError> {
        if offset >= self.cursor().parent_length || offset >= self.stack[0].parent_length {
            return Err(PackError::OutOfBounds);
        }
        let cursor = self.cursor_mut();
        cursor.element_start = cursor.parent_start + offset;
        cursor.element_length = 0;
        Ok(())
    }

    // ── Navigation ───────────────────────────────────────────

    pub fn has_next(&self) -> bool {
        let cursor = self.cursor();
        cursor.element_start + cursor.element_length < cursor.parent_end()
    }

    /// Advance to the next element of the current container.
    ///
    /// Returns `false` at the end of the container, or when the next
    /// header claims more words than the container has left. The cursor
    /// does not move in either case.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        let cursor = *self.cursor();
        let start = cursor.element_start + cursor.element_length;
        let length = (self.word(start) & LENGTH_MASK) as usize + 1;
        if start + length > cursor.parent_end() {
            return false;
        }
        let cursor = self.cursor_mut();
        cursor.element_start = start;
        cursor.element_length = length;
        true
    }

    /// Descend into the current container. The first `next` afterwards
    /// selects its first element.
    pub fn open(&mut self) -> Result<(), PackError> {
        if !self.is_container() {
            return Err(PackError::WrongKind);
        }
        let cursor = *self.cursor();
        let child = Cursor {
            parent_start: cursor.element_start + 1,
            parent_length: cursor.element_length - 1,
            element_start: cursor.element_start + 1,
            element_length: 0,
        };
        self.push(child, false)
    }

    /// Return to the enclosing level, leaving the container selected.
    pub fn close(&mut self) -> Result<(), PackError> {
        if self.depth == 0 {
            return Err(PackError::StackUnderflow);
        }
        self.depth -= 1;
        Ok(())
    }

    fn push(&mut self, cursor: Cursor, created: bool) -> Result<(), PackError> {
        if self.depth + 1 >= MAX_CURSOR_LEVELS {
            return Err(PackError::StackOverflow);
        }
        self.depth += 1;
        self.stack[self.depth] = cursor;
        self.created[self.depth] = created;
        Ok(())
    }

    /// Push a copy of the current level so it can be restored later.
    pub fn save_cursor(&mut self) -> Result<(), PackError> {
        let cursor = *self.cursor();
        self.push(cursor, false)
    }

    pub fn restore_cursor(&mut self) -> Result<(), PackError> {
        self.close()
    }

    pub fn reset_cursor(&mut self) {
        self.depth = 0;
    }

    /// Whether the current element is a string exactly equal to `key`.
    pub fn equals(&self, key: &str) -> bool {
        if !self.is_string() {
            return false;
        }
        let start = (self.cursor().element_start + 1) * WORD;
        let capacity = self.content_length() * WORD;
        let key = key.as_bytes();
        if key.len() >= capacity {
            return false;
        }
        let stored = &self.buffer[start..start + capacity];
        key.iter()
            .zip(stored)
            .all(|(k, s)| *k == s.get())
            && stored[key.len()].get() == 0
    }

    /// Map-key helper: if the current element equals `key`, step onto its
    /// value and return `true`. Otherwise the cursor stays on the key and
    /// the caller skips the value with [`next`](Self::next).
    pub fn match_key(&mut self, key: &str) -> bool {
        if !self.equals(key) {
            return false;
        }
        self.next();
        true
    }

    // ── Getters ──────────────────────────────────────────────

    pub fn get_boolean(&self) -> Result<bool, PackError> {
        match self.header() {
            Some(header) if self.is_boolean() => Ok(header & BOOLEAN_MASK != 0),
            _ => Err(PackError::WrongKind),
        }
    }

    /// Read a 32-bit integer. Floats are truncated toward zero; a 64-bit
    /// integer yields its low word.
    pub fn get_integer(&self) -> Result<i32, PackError> {
        match self.kind() {
            Some(Kind::Integer) => {
                self.require_content(1)?;
                Ok(self.word(self.cursor().element_start + 1) as i32)
            }
            Some(Kind::Float) => Ok(self.get_double()? as i32),
            _ => Err(PackError::WrongKind),
        }
    }

    /// Read a 64-bit integer. 32-bit integers are sign-extended, floats
    /// are truncated toward zero.
    pub fn get_big_integer(&self) -> Result<i64, PackError> {
        let start = self.cursor().element_start;
        match (self.kind(), self.content_length()) {
            (Some(Kind::Integer), 1) => Ok(i64::from(self.word(start + 1) as i32)),
            (Some(Kind::Integer), 2) => {
                let low = u64::from(self.word(start + 1));
                let high = u64::from(self.word(start + 2));
                Ok((low | high << 32) as i64)
            }
            (Some(Kind::Integer), _) => Err(PackError::InvalidLength),
            (Some(Kind::Float), _) => Ok(self.get_double()? as i64),
            _ => Err(PackError::WrongKind),
        }
    }

    /// Read a single-precision float. Integers are converted.
    pub fn get_float(&self) -> Result<f32, PackError> {
        match self.kind() {
            Some(Kind::Float) => Ok(self.get_double()? as f32),
            Some(Kind::Integer) => Ok(self.get_big_integer()? as f32),
            _ => Err(PackError::WrongKind),
        }
    }

    /// Read a double-precision float. Integers are converted.
    pub fn get_double(&self) -> Result<f64, PackError> {
        let start = self.cursor().element_start;
        match (self.kind(), self.content_length()) {
            (Some(Kind::Float), 1) => Ok(f64::from(f32::from_bits(self.word(start + 1)))),
            (Some(Kind::Float), 2) => {
                let low = u64::from(self.word(start + 1));
                let high = u64::from(self.word(start + 2));
                Ok(f64::from_bits(low | high << 32))
            }
            (Some(Kind::Float), _) => Err(PackError::InvalidLength),
            (Some(Kind::Integer), _) => Ok(self.get_big_integer()? as f64),
            _ => Err(PackError::WrongKind),
        }
    }

    fn require_content(&self, words: usize) -> Result<(), PackError> {
        if self.content_length() < words {
            return Err(PackError::InvalidLength);
        }
        Ok(())
    }

    /// Copy the current string into `dest` without its NUL padding and
    /// return its byte length. Fails with `InvalidLength` when `dest` is
    /// too small; nothing is copied in that case.
    pub fn get_string(&self, dest: &mut [u8]) -> Result<usize, PackError> {
        if !self.is_string() {
            return Err(PackError::WrongKind);
        }
        let start = (self.cursor().element_start + 1) * WORD;
        let stored = &self.buffer[start..start + self.content_length() * WORD];
        let length = stored
            .iter()
            .position(|c| c.get() == 0)
            .unwrap_or(stored.len());
        if dest.len() < length {
            return Err(PackError::InvalidLength);
        }
        for (d, s) in dest.iter_mut().zip(&stored[..length]) {
            *d = s.get();
        }
        Ok(length)
    }

    /// Read the current string into a fixed-capacity string.
    pub fn get_str<const N: usize>(&self) -> Result<heapless::String<N>, PackError> {
        let mut bytes = [0u8; N];
        let length = self.get_string(&mut bytes)?;
        let text = core::str::from_utf8(&bytes[..length]).map_err(|_| PackError::InvalidUtf8)?;
        let mut out = heapless::String::new();
        out.push_str(text).map_err(|()| PackError::InvalidLength)?;
        Ok(out)
    }

    /// Copy the content words of the current binary into `dest` and return
    /// the number of bytes copied (always a multiple of [`WORD`]).
    pub fn get_binary(&self, dest: &mut [u8]) -> Result<usize, PackError> {
        if !self.is_binary() {
            return Err(PackError::WrongKind);
        }
        let start = (self.cursor().element_start + 1) * WORD;
        let length = self.content_length() * WORD;
        if dest.len() < length {
            return Err(PackError::InvalidLength);
        }
        for (d, s) in dest.iter_mut().zip(&self.buffer[start..start + length]) {
            *d = s.get();
        }
        Ok(length)
    }

    // ── Writers ──────────────────────────────────────────────

    fn reserve(&self, words: usize) -> Result<usize, PackError> {
        if self.free_space() < words {
            return Err(PackError::BufferFull);
        }
        Ok(self.cursor().element_start)
    }

    fn advance(&mut self, words: usize) {
        let cursor = self.cursor_mut();
        cursor.element_start += words;
        cursor.element_length = 0;
    }

    fn put_words(&mut self, words: &[u32]) -> Result<(), PackError> {
        let start = self.reserve(words.len())?;
        for (i, word) in words.iter().enumerate() {
            self.set_word(start + i, *word);
        }
        self.advance(words.len());
        Ok(())
    }

    pub fn put_none(&mut self) -> Result<(), PackError> {
        self.put_words(&[Kind::None.tag()])
    }

    pub fn put_boolean(&mut self, value: bool) -> Result<(), PackError> {
        let kind = if value { Kind::True } else { Kind::False };
        self.put_words(&[kind.tag()])
    }

    pub fn put_integer(&mut self, value: i32) -> Result<(), PackError> {
        self.put_words(&[Kind::Integer.tag() | 1, value as u32])
    }

    pub fn put_big_integer(&mut self, value: i64) -> Result<(), PackError> {
        let bits = value as u64;
        self.put_words(&[Kind::Integer.tag() | 2, bits as u32, (bits >> 32) as u32])
    }

    pub fn put_float(&mut self, value: f32) -> Result<(), PackError> {
        self.put_words(&[Kind::Float.tag() | 1, value.to_bits()])
    }

    pub fn put_double(&mut self, value: f64) -> Result<(), PackError> {
        let bits = value.to_bits();
        self.put_words(&[Kind::Float.tag() | 2, bits as u32, (bits >> 32) as u32])
    }

    /// Write a string, NUL-padded to whole words. At least one NUL always
    /// follows the content.
    pub fn put_string(&mut self, value: &str) -> Result<(), PackError> {
        let content = (value.len() + WORD) / WORD;
        self.put_block(Kind::String, value.as_bytes(), content)
    }

    /// Write a binary blob, zero-padded to whole words.
    pub fn put_binary(&mut self, value: &[u8]) -> Result<(), PackError> {
        self.put_block(Kind::Binary, value, value.len().div_ceil(WORD))
    }

    fn put_block(&mut self, kind: Kind, bytes: &[u8], content: usize) -> Result<(), PackError> {
        if content > LENGTH_MASK as usize {
            return Err(PackError::InvalidLength);
        }
        let start = self.reserve(1 + content)?;
        self.set_word(start, kind.tag() | content as u32);
        let base = (start + 1) * WORD;
        for (i, cell) in self.buffer[base..base + content * WORD].iter().enumerate() {
            cell.set(bytes.get(i).copied().unwrap_or(0));
        }
        self.advance(1 + content);
        Ok(())
    }

    /// Start a List or Map. Subsequent writes go inside it until
    /// [`finish_container`](Self::finish_container) backpatches its length.
    pub fn create_container(&mut self, kind: Kind) -> Result<(), PackError> {
        if !kind.is_container() {
            return Err(PackError::WrongKind);
        }
        let start = self.reserve(1)?;
        if self.depth + 1 >= MAX_CURSOR_LEVELS {
            return Err(PackError::StackOverflow);
        }
        self.set_word(start, kind.tag());
        let child = Cursor {
            parent_start: start + 1,
            parent_length: self.free_space() - 1,
            element_start: start + 1,
            element_length: 0,
        };
        self.push(child, true)
    }

    /// Close the container opened by the matching `create_container`.
    ///
    /// Levels entered with [`open`](Self::open) or
    /// [`save_cursor`](Self::save_cursor) are not containers being written
    /// and are refused with `WrongKind`; the buffer is left untouched.
    pub fn finish_container(&mut self) -> Result<(), PackError> {
        if self.depth == 0 {
            return Err(PackError::StackUnderflow);
        }
        if !self.created[self.depth] {
            return Err(PackError::WrongKind);
        }
        let child = *self.cursor();
        let header_index = child.parent_start - 1;
        let length = (child.element_start - child.parent_start) as u32;
        self.set_word(header_index, self.word(header_index) | length);
        self.depth -= 1;
        let parent = self.cursor_mut();
        parent.element_start = child.element_start;
        parent.element_length = 0;
        Ok(())
    }
}

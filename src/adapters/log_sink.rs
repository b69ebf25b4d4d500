//! Log capture adapter.
//!
//! [`LogCapture`] is installed as the global [`log`] logger. It keeps the
//! most recent lines in a [`LogRing`] for the `logs` resource and hands
//! every record on to the console logger it wraps.

use core::fmt::Write;
use std::sync::{Mutex, PoisonError};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::app::measurements::Truncating;
use crate::rpc::pack::{Kind, Pack, PackError};

/// Lines the ring keeps.
pub const LOG_LINES_MAX: usize = 64;

/// Longest captured line, in bytes; longer lines are cut.
pub const LOG_LINE_LENGTH: usize = 89;

pub type LogLine = heapless::String<LOG_LINE_LENGTH>;

/// Most recent log lines, oldest first.
pub struct LogRing {
    lines: Mutex<heapless::Deque<LogLine, LOG_LINES_MAX>>,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}

impl LogRing {
    pub const fn new() -> Self {
        Self {
            lines: Mutex::new(heapless::Deque::new()),
        }
    }

    /// Store `text`, one entry per non-empty line, evicting the oldest.
    pub fn push(&self, text: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        for part in text.split('\n').filter(|p| !p.is_empty()) {
            let mut line = LogLine::new();
            let _ = Truncating(&mut line).write_str(part);
            if lines.is_full() {
                lines.pop_front();
            }
            let _ = lines.push_back(line);
        }
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the lines as a list of strings.
    pub fn write_to(&self, writer: &mut Pack<'_>) -> Result<(), PackError> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        writer.create_container(Kind::List)?;
        for line in lines.iter() {
            writer.put_string(line)?;
        }
        writer.finish_container()
    }
}

/// Tee logger: capture into a ring, forward to `inner`.
pub struct LogCapture<L: Log> {
    ring: &'static LogRing,
    inner: L,
}

impl<L: Log> LogCapture<L> {
    pub fn new(ring: &'static LogRing, inner: L) -> Self {
        Self { ring, inner }
    }
}

const fn level_letter(level: Level) -> char {
    match level {
        Level::Error => 'E',
        Level::Warn => 'W',
        Level::Info => 'I',
        Level::Debug => 'D',
        Level::Trace => 'V',
    }
}

impl<L: Log> Log for LogCapture<L> {
    // The `log` macros already apply the global max level.
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let mut line = heapless::String::<LOG_LINE_LENGTH>::new();
        let _ = write!(
            Truncating(&mut line),
            "{} {}: {}",
            level_letter(record.level()),
            record.target(),
            record.args()
        );
        self.ring.push(&line);
        if self.inner.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install a capture around `inner` as the global logger.
pub fn install<L: Log + 'static>(
    ring: &'static LogRing,
    inner: L,
    level: LevelFilter,
) -> Result<(), SetLoggerError> {
    let capture: &'static LogCapture<L> = Box::leak(Box::new(LogCapture::new(ring, inner)));
    log::set_logger(capture)?;
    log::set_max_level(level);
    Ok(())
}

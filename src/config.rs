//! System configuration parameters
//!
//! Everything the device persists across reboots. Values are changed at
//! runtime through the `board` and `application` resources and stored as
//! one postcard blob through a [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

use crate::rpc::auth::Key;

/// Board model labels, indexed by [`SystemConfig::board_model`].
/// Index 0 is "not configured".
pub const BOARD_MODELS: [&str; 23] = [
    "",
    "generic",
    "m5stack_atom_lite",
    "m5stack_atom_matrix",
    "m5stack_atom_echo",
    "m5stack_atom_u",
    "m5stack_atoms3",
    "m5stack_atoms3_lite",
    "m5stack_m5stickc",
    "m5stack_m5stickc_plus",
    "m5stack_core2",
    "m5stack_core2_aws",
    "m5stack_tough",
    "m5stack_m5station_bat",
    "m5stack_m5station_485",
    "adafruit_esp32_feather_v2",
    "adafruit_esp32_s3_feather",
    "adafruit_qt_py_esp32_pico",
    "adafruit_qt_py_esp32_s3",
    "seeedstudio_xiao_esp32s3",
    "seeedstudio_xiao_esp32c3",
    "seeedstudio_xiao_esp32c6",
    "m5stack_nanoc6",
];

/// Label of a board model index. Unknown indices read as the empty label.
pub fn board_model_label(index: u32) -> &'static str {
    BOARD_MODELS.get(index as usize).copied().unwrap_or("")
}

/// Index of a board model label, exact match only.
pub fn board_model_index(label: &str) -> Option<u32> {
    BOARD_MODELS
        .iter()
        .position(|m| *m == label)
        .map(|i| i as u32)
}

/// Highest accepted log level (verbose).
pub const LOG_LEVEL_MAX: u8 = 5;

/// Baud rates the console UART may be switched to.
pub const SUPPORTED_BAUD_RATES: [u32; 8] =
    [9600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800, 921_600];

/// Map a stored log level (0 none .. 5 verbose) onto the `log` filter.
pub fn level_filter(level: u8) -> log::LevelFilter {
    match level {
        0 => log::LevelFilter::Off,
        1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Board ---
    /// Index into [`BOARD_MODELS`]
    pub board_model: u32,
    /// Log verbosity, 0 (none) to 5 (verbose)
    pub log_level: u8,

    // --- Application ---
    /// Seconds between measurement rounds
    pub sampling_period_secs: u32,
    /// Queue measurements while the backend is unreachable
    pub queue: bool,
    /// Publish diagnostic metrics alongside measurements
    pub diagnostics: bool,
    /// Deep-sleep between measurement rounds
    pub sleep: bool,

    // --- Backend ---
    /// Identity placed in signature trailers
    pub backend_user: heapless::String<32>,
    /// 512-bit signing key as 128 hex digits; empty disables signing
    pub backend_key_hex: heapless::String<128>,

    // --- Serial ---
    pub serial_baud_rate: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            board_model: 0,
            log_level: 3, // info

            sampling_period_secs: 600,
            queue: false,
            diagnostics: false,
            sleep: false,

            backend_user: heapless::String::new(),
            backend_key_hex: heapless::String::new(),

            serial_baud_rate: 115_200,
        }
    }
}

impl SystemConfig {
    /// Decoded signing key, or `None` when no key is configured or the
    /// stored digits do not make exactly 64 bytes.
    pub fn backend_key(&self) -> Option<Key> {
        if self.backend_key_hex.is_empty() {
            return None;
        }
        Key::from_hex(&self.backend_key_hex).ok()
    }

    pub fn board_model_label(&self) -> &'static str {
        board_model_label(self.board_model)
    }
}

//! Port traits: the boundary between resources and the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ resources (domain)
//! ```
//!
//! Driven adapters (NVS, clocks, chip queries) implement these traits.
//! Resources consume them through generics, so request handling never
//! touches hardware directly and runs unchanged in host tests.

use crate::config::SystemConfig;

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting (see
/// [`validate_config`](crate::adapters::nvs::validate_config)); invalid
/// values are rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

pub trait TimePort {
    /// Wall-clock seconds since the Unix epoch, or 0 while the clock has
    /// not been synchronised.
    fn now(&self) -> i64;

    /// Seconds since boot (monotonic).
    fn uptime_secs(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Platform port (chip and heap queries)
// ───────────────────────────────────────────────────────────────

pub trait PlatformPort {
    /// 64-bit identity derived from the factory MAC.
    fn device_id(&self) -> u64;

    /// Processor name, e.g. `ESP32-S3`; empty when unknown.
    fn processor(&self) -> &'static str;

    /// Flash size in KiB, 0 when unknown.
    fn flash_size_kib(&self) -> u32;

    fn free_heap(&self) -> u32;

    fn minimum_free_heap(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

//! Application core: port traits, shared settings and the measurement
//! queue.
//!
//! Resources reach storage, clocks and chip queries only through the
//! **port traits** in [`ports`], keeping request handling testable without
//! real peripherals.

pub mod measurements;
pub mod ports;
pub mod settings;

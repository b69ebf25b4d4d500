//! SensorWatcher firmware library.
//!
//! Exposes the wire protocol, the built-in resources and the host-testable
//! adapters. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod resources;
pub mod rpc;

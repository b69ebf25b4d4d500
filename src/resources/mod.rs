//! Built-in resources served by the postman.
//!
//! | Path           | GET                              | PUT                           |
//! |----------------|----------------------------------|-------------------------------|
//! | `board`        | id, processor, flash, model, log | model, log_level              |
//! | `application`  | identity, clock, heap, sampling  | sampling_period, queue, diag. |
//! | `measurements` | queued `[name, time, unit, v]`   |                               |
//! | `logs`         | recent log lines                 |                               |
//!
//! `board` and `application` follow the same request shape: GET writes one
//! map, PUT reads one map and skips keys it does not know. Changes are
//! committed through [`Settings`], so a failed save leaves the running
//! configuration alone. The last two are read-only.

pub mod application;
pub mod board;
pub mod logs;
pub mod measurements;

pub use application::Application;
pub use board::Board;
pub use logs::Logs;
pub use measurements::MeasurementsResource;

use log::warn;

use crate::adapters::log_sink::LogRing;
use crate::app::measurements::Measurements;
use crate::app::ports::{ConfigError, ConfigPort, PlatformPort, TimePort};
use crate::app::settings::Settings;
use crate::config::SystemConfig;
use crate::rpc::engine::{Postman, RegistryError, Status};
use crate::rpc::pack::Pack;

/// State the built-in resources read from.
pub struct Services<C: ConfigPort, T, P> {
    pub settings: Settings<C>,
    pub measurements: Measurements,
    pub logs: &'static LogRing,
    pub clock: T,
    pub platform: P,
}

/// Register every built-in resource on `postman`.
pub fn register_all<C, T, P>(
    postman: &mut Postman,
    services: &Services<C, T, P>,
) -> Result<(), RegistryError>
where
    C: ConfigPort + 'static,
    T: TimePort + Clone + 'static,
    P: PlatformPort + Clone + 'static,
{
    let Services {
        settings,
        measurements,
        logs,
        clock,
        platform,
    } = services;
    postman.register("board", Board::new(settings.clone(), platform.clone()))?;
    postman.register(
        "application",
        Application::new(settings.clone(), clock.clone(), platform.clone()),
    )?;
    postman.register(measurements::PATH, MeasurementsResource::new(measurements.clone()))?;
    postman.register("logs", Logs::new(*logs))?;
    Ok(())
}

/// Move a handler's reader from the root path segment into the request
/// body, which must be a map.
fn open_body_map(reader: &mut Pack<'_>) -> bool {
    reader.close().is_ok() && reader.next() && reader.is_map() && reader.open().is_ok()
}

/// Persist a changed configuration and translate the outcome.
fn commit<C: ConfigPort>(settings: &Settings<C>, candidate: SystemConfig) -> Status {
    match settings.commit(candidate) {
        Ok(()) => Status::Changed,
        Err(ConfigError::ValidationFailed(reason)) => {
            warn!("resources: rejected update: {}", reason);
            Status::BadRequest
        }
        Err(e) => {
            warn!("resources: cannot persist update: {}", e);
            Status::InternalServerError
        }
    }
}

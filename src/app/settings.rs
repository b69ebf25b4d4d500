//! Shared runtime settings.
//!
//! Several resources read and change the same [`SystemConfig`]. They each
//! hold a cheap [`Settings`] handle; changes go through [`Settings::commit`],
//! which persists first and only then swaps the in-memory copy, so a failed
//! save leaves the running configuration untouched.

use core::cell::RefCell;
use std::rc::Rc;

use log::info;

use super::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

struct Shared<C> {
    config: RefCell<SystemConfig>,
    port: C,
}

pub struct Settings<C: ConfigPort> {
    shared: Rc<Shared<C>>,
}

impl<C: ConfigPort> Clone for Settings<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<C: ConfigPort> Settings<C> {
    /// Load the stored configuration through `port`.
    pub fn load(port: C) -> Result<Self, ConfigError> {
        let config = port.load()?;
        Ok(Self::with_config(port, config))
    }

    /// Start from a known configuration without touching storage.
    pub fn with_config(port: C, config: SystemConfig) -> Self {
        Self {
            shared: Rc::new(Shared {
                config: RefCell::new(config),
                port,
            }),
        }
    }

    /// A copy of the running configuration.
    pub fn snapshot(&self) -> SystemConfig {
        self.shared.config.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&SystemConfig) -> R) -> R {
        f(&self.shared.config.borrow())
    }

    /// Persist `candidate` and make it the running configuration.
    pub fn commit(&self, candidate: SystemConfig) -> Result<(), ConfigError> {
        self.shared.port.save(&candidate)?;
        *self.shared.config.borrow_mut() = candidate;
        info!("settings: configuration committed");
        Ok(())
    }

    pub fn port(&self) -> &C {
        &self.shared.port
    }
}

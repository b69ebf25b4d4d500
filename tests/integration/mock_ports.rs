//! Mock ports for integration tests.
//!
//! Records every configuration save so tests can assert on what reached
//! "flash" without touching NVS.

use std::cell::{Cell, RefCell};

use sensorwatcher::adapters::log_sink::LogRing;
use sensorwatcher::adapters::nvs::validate_config;
use sensorwatcher::app::measurements::Measurements;
use sensorwatcher::app::ports::{ConfigError, ConfigPort, PlatformPort, TimePort};
use sensorwatcher::app::settings::Settings;
use sensorwatcher::config::SystemConfig;
use sensorwatcher::resources::{self, Services};
use sensorwatcher::rpc::engine::Postman;

// ── MockConfig ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockConfig {
    pub saved: RefCell<Vec<SystemConfig>>,
    pub fail: Cell<bool>,
}

#[allow(dead_code)]
impl MockConfig {
    pub fn last_saved(&self) -> Option<SystemConfig> {
        self.saved.borrow().last().cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saved.borrow().len()
    }
}

impl ConfigPort for MockConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.last_saved().unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        if self.fail.get() {
            return Err(ConfigError::IoError);
        }
        validate_config(config)?;
        self.saved.borrow_mut().push(config.clone());
        Ok(())
    }
}

// ── FixedClock ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub now: i64,
    pub uptime: u64,
}

impl TimePort for FixedClock {
    fn now(&self) -> i64 {
        self.now
    }

    fn uptime_secs(&self) -> u64 {
        self.uptime
    }
}

// ── FakeChip ──────────────────────────────────────────────────

pub const DEVICE_ID: u64 = 0x1A2B_3C4D_5E6F_7788;

#[derive(Debug, Clone, Copy, Default)]
pub struct FakeChip;

impl PlatformPort for FakeChip {
    fn device_id(&self) -> u64 {
        DEVICE_ID
    }

    fn processor(&self) -> &'static str {
        "ESP32-S3"
    }

    fn flash_size_kib(&self) -> u32 {
        8192
    }

    fn free_heap(&self) -> u32 {
        200_000
    }

    fn minimum_free_heap(&self) -> u32 {
        150_000
    }
}

// ── Fixture ───────────────────────────────────────────────────

pub const NOW: i64 = 1_700_000_000;

pub struct Device {
    pub postman: Postman,
    pub services: Services<MockConfig, FixedClock, FakeChip>,
}

/// A postman with every built-in resource registered over mock ports.
pub fn fixture() -> Device {
    let services = Services {
        settings: Settings::load(MockConfig::default()).unwrap(),
        measurements: Measurements::new(),
        logs: Box::leak(Box::new(LogRing::new())),
        clock: FixedClock {
            now: NOW,
            uptime: 42,
        },
        platform: FakeChip,
    };
    let mut postman = Postman::new();
    resources::register_all(&mut postman, &services).unwrap();
    Device { postman, services }
}

pub fn device() -> (Postman, Settings<MockConfig>) {
    let Device { postman, services } = fixture();
    (postman, services.settings)
}

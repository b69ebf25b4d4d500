//! SensorWatcher Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter      SystemClock     ChipInfo       UartTransport  │
//! │  (ConfigPort)    (TimePort)      (PlatformPort) (Transport)    │
//! │  LogCapture ─▶ EspLogger, LogRing                              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Postman ─▶ board · application · measurements · logs  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  SerialLink: framer + postman, polled from the main loop       │
//! │  Sampler: diagnostics every period, pushed as a notification   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use log::{LevelFilter, info, warn};

use sensorwatcher::adapters::device_id::{ChipInfo, format_device_id};
use sensorwatcher::adapters::log_sink::{self, LogRing};
use sensorwatcher::adapters::nvs::NvsAdapter;
use sensorwatcher::adapters::serial::UartTransport;
use sensorwatcher::adapters::time::SystemClock;
use sensorwatcher::app::measurements::{Measurements, sample_diagnostics};
use sensorwatcher::app::ports::{ConfigPort, PlatformPort, TimePort};
use sensorwatcher::app::settings::Settings;
use sensorwatcher::config::{SystemConfig, level_filter};
use sensorwatcher::error::Error;
use sensorwatcher::resources::measurements::queue_notification;
use sensorwatcher::resources::{self, Services, application::APP_VERSION};
use sensorwatcher::rpc::auth::Credentials;
use sensorwatcher::rpc::engine::{PACKET_LENGTH_MAX, Postman};
use sensorwatcher::rpc::transport::SerialLink;

/// Idle delay between serial polls.
const POLL_INTERVAL_MS: u32 = 10;

static LOGS: LogRing = LogRing::new();

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    log_sink::install(&LOGS, EspLogger::new(), LevelFilter::Info)
        .map_err(|_| Error::Init("logger already installed"))?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SensorWatcher v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let nvs = NvsAdapter::new()?;
    let config = nvs.load().unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        SystemConfig::default()
    });
    let settings = Settings::with_config(nvs, config.clone());
    log::set_max_level(level_filter(config.log_level));

    let chip = ChipInfo;
    info!(
        "Board {} ({}), model '{}', app version {:04X}",
        format_device_id(chip.device_id()),
        chip.processor(),
        config.board_model_label(),
        APP_VERSION
    );
    match config.backend_key() {
        Some(_) => info!("Notifications signed as backend user '{}'", config.backend_user),
        None => info!("No backend key configured, notifications are unsigned"),
    }

    // ── 3. Resources ──────────────────────────────────────────
    let clock = SystemClock::new();
    let services = Services {
        settings,
        measurements: Measurements::new(),
        logs: &LOGS,
        clock,
        platform: chip,
    };
    let mut postman = Postman::new();
    resources::register_all(&mut postman, &services)?;

    // ── 4. Serial link ────────────────────────────────────────
    let peripherals = Peripherals::take().map_err(|_| Error::Init("peripherals already taken"))?;
    let uart = UartTransport::new(
        peripherals.uart0,
        peripherals.pins.gpio43,
        peripherals.pins.gpio44,
        config.serial_baud_rate,
    )?;
    let mut buffer = vec![0u8; PACKET_LENGTH_MAX];
    let mut link = SerialLink::new(uart, &mut buffer);

    info!("System ready. Serving requests on UART0.");

    // ── 5. Main loop ──────────────────────────────────────────
    let mut next_sample = 0u64;
    loop {
        match link.poll(&mut postman, clock.now()) {
            Ok(true) => {}
            Ok(false) => FreeRtos::delay_ms(POLL_INTERVAL_MS),
            Err(e) => {
                warn!("Serial link error: {}", e);
                FreeRtos::delay_ms(POLL_INTERVAL_MS);
            }
        }

        let uptime = clock.uptime_secs();
        if uptime < next_sample {
            continue;
        }
        let current = services.settings.snapshot();
        next_sample = uptime + u64::from(current.sampling_period_secs.max(1));

        if !current.queue {
            services.measurements.clear();
        }
        if current.diagnostics {
            sample_diagnostics(&services.measurements, &clock, &chip, current.queue);
        }
        if services.measurements.read(|ring| ring.is_empty()) {
            continue;
        }

        let backend_key = current.backend_key();
        let credentials = backend_key.as_ref().map(|key| Credentials {
            id: &current.backend_user,
            key,
        });
        let now = clock.now();
        match queue_notification(link.buffer_mut(), &services.measurements, now, credentials) {
            Ok(length) => {
                if let Err(e) = link.send(length) {
                    warn!("Measurement notification not sent: {}", e);
                }
            }
            Err(e) => warn!("Measurement notification not built: {}", e),
        }
    }
}

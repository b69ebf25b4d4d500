//! Clock adapter.
//!
//! - **`target_os = "espidf"`**: uptime from `esp_timer_get_time()`
//!   (microsecond precision, monotonic), wall clock from `gettimeofday`.
//! - **`not(target_os = "espidf")`**: `std::time` for host-side testing.
//!
//! Wall-clock time is only trusted once it has been set (SNTP or a backend
//! response); before that [`TimePort::now`] reports 0.

use crate::app::ports::TimePort;

/// Epoch seconds below which the wall clock is considered unsynchronised
/// (2023-03-28).
pub const CLOCK_SYNC_THRESHOLD: i64 = 1_680_000_000;

/// Apply the synchronisation threshold to a raw epoch reading.
pub const fn trusted_now(epoch_secs: i64) -> i64 {
    if epoch_secs > CLOCK_SYNC_THRESHOLD {
        epoch_secs
    } else {
        0
    }
}

/// System clock for the ESP32 platform.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Raw epoch seconds from the RTC, synchronised or not.
    #[cfg(target_os = "espidf")]
    fn epoch_secs(&self) -> i64 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        tv.tv_sec as i64
    }

    #[cfg(not(target_os = "espidf"))]
    fn epoch_secs(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }
}

impl TimePort for SystemClock {
    fn now(&self) -> i64 {
        trusted_now(self.epoch_secs())
    }

    #[cfg(target_os = "espidf")]
    fn uptime_secs(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

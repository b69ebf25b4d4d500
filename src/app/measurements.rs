//! Measurement queue.
//!
//! A fixed ring of the most recent samples, oldest first. Outside queue
//! mode the ring is cleared every sampling round and refuses samples once
//! full. In queue mode it keeps accumulating across rounds, overwriting
//! the oldest entry, but only accepts samples with a trusted timestamp so
//! that queued data can be placed in time later.

use core::cell::RefCell;
use core::fmt::Write;
use std::rc::Rc;

use log::debug;

use super::ports::{PlatformPort, TimePort};
use crate::adapters::time::CLOCK_SYNC_THRESHOLD;
use crate::rpc::pack::{Kind, Pack, PackError};

/// Entries the ring holds.
pub const MEASUREMENTS_MAX: usize = 64;

/// Longest measurement name, in bytes.
pub const NAME_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// `<device id>_<source>_<metric>`, e.g. `1A2B3C4D5E6F7788_application_UpTime`.
    pub name: heapless::String<NAME_LENGTH>,
    /// Seconds since the epoch, 0 when the clock was not synchronised.
    pub time: i64,
    pub unit: &'static str,
    pub value: f32,
}

impl Measurement {
    /// Build the name from its parts. Parts that do not fit are cut at
    /// the name length.
    pub fn new(
        device_id: u64,
        source: &str,
        metric: &str,
        time: i64,
        unit: &'static str,
        value: f32,
    ) -> Self {
        let mut name = heapless::String::new();
        let mut writer = Truncating(&mut name);
        let _ = write!(writer, "{device_id:016X}_{source}_{metric}");
        Self {
            name,
            time,
            unit,
            value,
        }
    }

    /// `[name, time, unit, value]`
    pub fn write_to(&self, writer: &mut Pack<'_>) -> Result<(), PackError> {
        writer.create_container(Kind::List)?;
        writer.put_string(&self.name)?;
        writer.put_big_integer(self.time)?;
        writer.put_string(self.unit)?;
        writer.put_float(self.value)?;
        writer.finish_container()
    }
}

/// `fmt::Write` into a fixed string, dropping whatever does not fit.
pub(crate) struct Truncating<'s, const N: usize>(pub &'s mut heapless::String<N>);

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MeasurementRing {
    entries: heapless::Deque<Measurement, MEASUREMENTS_MAX>,
}

impl MeasurementRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample. Returns `false` when it was refused: the ring is
    /// full outside queue mode, or the sample is untimed in queue mode.
    pub fn append(&mut self, mut measurement: Measurement, queue: bool) -> bool {
        let timed = measurement.time > CLOCK_SYNC_THRESHOLD;
        if queue && !timed {
            debug!("measurements: untimed sample {} not queued", measurement.name);
            return false;
        }
        if self.entries.is_full() {
            if !queue {
                return false;
            }
            self.entries.pop_front();
        }
        if !timed {
            measurement.time = 0;
        }
        self.entries.push_back(measurement).is_ok()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.entries.iter()
    }

    /// `[[name, time, unit, value], ...]`, oldest first.
    pub fn write_to(&self, writer: &mut Pack<'_>) -> Result<(), PackError> {
        writer.create_container(Kind::List)?;
        for measurement in self.iter() {
            measurement.write_to(writer)?;
        }
        writer.finish_container()
    }
}

/// Shared handle to the ring: the sampler appends, the `measurements`
/// resource and the notifier read.
#[derive(Clone, Default)]
pub struct Measurements {
    ring: Rc<RefCell<MeasurementRing>>,
}

impl Measurements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, measurement: Measurement, queue: bool) -> bool {
        self.ring.borrow_mut().append(measurement, queue)
    }

    pub fn clear(&self) {
        self.ring.borrow_mut().clear();
    }

    pub fn read<R>(&self, f: impl FnOnce(&MeasurementRing) -> R) -> R {
        f(&self.ring.borrow())
    }
}

/// Append the device's own health figures: up time and the heap low-water
/// mark. Returns how many samples were stored.
pub fn sample_diagnostics<T: TimePort, P: PlatformPort>(
    measurements: &Measurements,
    clock: &T,
    platform: &P,
    queue: bool,
) -> usize {
    let id = platform.device_id();
    let now = clock.now();
    let samples = [
        Measurement::new(id, "application", "UpTime", now, "s", clock.uptime_secs() as f32),
        Measurement::new(
            id,
            "application",
            "MinimumFreeHeap",
            now,
            "B",
            platform.minimum_free_heap() as f32,
        ),
    ];
    let mut stored = 0;
    for measurement in samples {
        if measurements.append(measurement, queue) {
            stored += 1;
        }
    }
    stored
}

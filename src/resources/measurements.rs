//! `measurements` resource and the notifications that push the queue.

use log::warn;

use crate::app::measurements::{Measurement, Measurements};
use crate::rpc::auth::Credentials;
use crate::rpc::engine::{Method, Resource, Status, build_notification};
use crate::rpc::pack::{Kind, Pack, PackError};

pub const PATH: &str = "measurements";

/// GET returns every queued measurement, oldest first.
pub struct MeasurementsResource {
    measurements: Measurements,
}

impl MeasurementsResource {
    pub fn new(measurements: Measurements) -> Self {
        Self { measurements }
    }
}

impl Resource for MeasurementsResource {
    fn handle(&mut self, method: Method, _reader: &mut Pack<'_>, writer: &mut Pack<'_>) -> Status {
        if method != Method::Get {
            return Status::MethodNotAllowed;
        }
        match self.measurements.read(|ring| ring.write_to(writer)) {
            Ok(()) => Status::Content,
            Err(e) => {
                warn!("measurements: cannot write queue: {}", e);
                Status::InternalServerError
            }
        }
    }
}

/// Push the whole queue as one `2.05` message on `measurements`, signed
/// when `credentials` are given. Returns its length in bytes.
pub fn queue_notification(
    buffer: &mut [u8],
    measurements: &Measurements,
    now: i64,
    credentials: Option<Credentials<'_>>,
) -> Result<usize, PackError> {
    measurements.read(|ring| {
        build_notification(buffer, PATH, |w| ring.write_to(w), now, credentials)
    })
}

/// Push a single measurement, wrapped in a one-row list so receivers
/// parse it like the full queue.
pub fn entry_notification(
    buffer: &mut [u8],
    measurement: &Measurement,
    now: i64,
    credentials: Option<Credentials<'_>>,
) -> Result<usize, PackError> {
    build_notification(
        buffer,
        PATH,
        |w| {
            w.create_container(Kind::List)?;
            measurement.write_to(w)?;
            w.finish_container()
        },
        now,
        credentials,
    )
}

//! `logs` resource: the most recent captured log lines.

use log::warn;

use crate::adapters::log_sink::LogRing;
use crate::rpc::engine::{Method, Resource, Status};
use crate::rpc::pack::Pack;

pub struct Logs {
    ring: &'static LogRing,
}

impl Logs {
    pub fn new(ring: &'static LogRing) -> Self {
        Self { ring }
    }
}

impl Resource for Logs {
    fn handle(&mut self, method: Method, _reader: &mut Pack<'_>, writer: &mut Pack<'_>) -> Status {
        if method != Method::Get {
            return Status::MethodNotAllowed;
        }
        match self.ring.write_to(writer) {
            Ok(()) => Status::Content,
            Err(e) => {
                warn!("logs: cannot write {} lines: {}", self.ring.len(), e);
                Status::InternalServerError
            }
        }
    }
}

//! `application` resource: firmware identity, clock, heap and sampling
//! settings.

use log::{info, warn};

use super::{commit, open_body_map};
use crate::app::ports::{ConfigPort, PlatformPort, TimePort};
use crate::app::settings::Settings;
use crate::rpc::engine::{Method, Resource, Status};
use crate::rpc::pack::{Kind, Pack, PackError};

pub const APP_ID: &str = "com.movoki.sensor_watcher";
pub const APP_NAME: &str = "SensorWatcher";
pub const APP_VERSION: i32 = 0x000C;

pub struct Application<C: ConfigPort, T: TimePort, P: PlatformPort> {
    settings: Settings<C>,
    clock: T,
    platform: P,
}

impl<C: ConfigPort, T: TimePort, P: PlatformPort> Application<C, T, P> {
    pub fn new(settings: Settings<C>, clock: T, platform: P) -> Self {
        Self {
            settings,
            clock,
            platform,
        }
    }

    fn write_state(&self, writer: &mut Pack<'_>) -> Result<(), PackError> {
        let config = self.settings.snapshot();

        writer.create_container(Kind::Map)?;
        writer.put_string("id")?;
        writer.put_string(APP_ID)?;
        writer.put_string("name")?;
        writer.put_string(APP_NAME)?;
        writer.put_string("version")?;
        writer.put_integer(APP_VERSION)?;
        writer.put_string("free_heap")?;
        writer.put_integer(self.platform.free_heap() as i32)?;
        writer.put_string("minimum_free_heap")?;
        writer.put_integer(self.platform.minimum_free_heap() as i32)?;
        writer.put_string("time")?;
        writer.put_big_integer(self.clock.now())?;
        writer.put_string("up_time")?;
        writer.put_integer(self.clock.uptime_secs() as i32)?;

        writer.put_string("sampling_period")?;
        writer.put_integer(config.sampling_period_secs as i32)?;
        writer.put_string("queue")?;
        writer.put_boolean(config.queue)?;
        writer.put_string("diagnostics")?;
        writer.put_boolean(config.diagnostics)?;
        writer.put_string("sleep")?;
        writer.put_boolean(config.sleep)?;
        writer.finish_container()
    }

    fn update(&mut self, reader: &mut Pack<'_>) -> Status {
        if !open_body_map(reader) {
            return Status::BadRequest;
        }
        let mut next = self.settings.snapshot();
        let mut valid = true;
        while valid && reader.next() {
            if reader.match_key("sampling_period") {
                match reader.get_integer().map(u32::try_from) {
                    Ok(Ok(period)) => next.sampling_period_secs = period,
                    _ => valid = false,
                }
            } else if reader.match_key("queue") {
                valid = read_flag(reader, &mut next.queue);
            } else if reader.match_key("diagnostics") {
                valid = read_flag(reader, &mut next.diagnostics);
            } else if reader.match_key("sleep") {
                valid = read_flag(reader, &mut next.sleep);
            } else {
                reader.next();
            }
        }
        let _ = reader.close();
        if !valid {
            warn!("application: invalid update");
            return Status::BadRequest;
        }

        let period = next.sampling_period_secs;
        let status = commit(&self.settings, next);
        if status == Status::Changed {
            info!("application: sampling every {} s", period);
        }
        status
    }
}

fn read_flag(reader: &Pack<'_>, flag: &mut bool) -> bool {
    match reader.get_boolean() {
        Ok(value) => {
            *flag = value;
            true
        }
        Err(_) => false,
    }
}

impl<C: ConfigPort, T: TimePort, P: PlatformPort> Resource for Application<C, T, P> {
    fn handle(&mut self, method: Method, reader: &mut Pack<'_>, writer: &mut Pack<'_>) -> Status {
        match method {
            Method::Get => match self.write_state(writer) {
                Ok(()) => Status::Content,
                Err(e) => {
                    warn!("application: cannot write state: {}", e);
                    Status::InternalServerError
                }
            },
            Method::Put => self.update(reader),
            _ => Status::MethodNotAllowed,
        }
    }
}

//! `board` resource: hardware identity and board-level settings.

use log::{info, warn};

use super::{commit, open_body_map};
use crate::adapters::device_id::format_device_id;
use crate::app::ports::{ConfigPort, PlatformPort};
use crate::app::settings::Settings;
use crate::config::{LOG_LEVEL_MAX, board_model_index, level_filter};
use crate::rpc::engine::{Method, Resource, Status};
use crate::rpc::pack::{Kind, Pack, PackError};

/// Longest board model label accepted in a PUT.
const MODEL_LABEL_MAX: usize = 32;

pub struct Board<C: ConfigPort, P: PlatformPort> {
    settings: Settings<C>,
    platform: P,
}

impl<C: ConfigPort, P: PlatformPort> Board<C, P> {
    pub fn new(settings: Settings<C>, platform: P) -> Self {
        Self { settings, platform }
    }

    fn write_state(&self, writer: &mut Pack<'_>) -> Result<(), PackError> {
        let config = self.settings.snapshot();
        let id = format_device_id(self.platform.device_id());

        writer.create_container(Kind::Map)?;
        writer.put_string("id")?;
        writer.put_string(&id)?;
        writer.put_string("processor")?;
        writer.put_string(self.platform.processor())?;
        writer.put_string("flash_size")?;
        writer.put_integer(self.platform.flash_size_kib() as i32)?;
        writer.put_string("model")?;
        writer.put_string(config.board_model_label())?;
        writer.put_string("log_level")?;
        writer.put_integer(i32::from(config.log_level))?;
        writer.finish_container()
    }

    fn update(&mut self, reader: &mut Pack<'_>) -> Status {
        if !open_body_map(reader) {
            return Status::BadRequest;
        }
        let mut next = self.settings.snapshot();
        let mut valid = true;
        while valid && reader.next() {
            if reader.match_key("model") {
                match reader
                    .get_str::<MODEL_LABEL_MAX>()
                    .ok()
                    .and_then(|label| board_model_index(&label))
                {
                    Some(model) => next.board_model = model,
                    None => valid = false,
                }
            } else if reader.match_key("log_level") {
                match reader.get_integer() {
                    Ok(level) if (0..=i32::from(LOG_LEVEL_MAX)).contains(&level) => {
                        next.log_level = level as u8;
                    }
                    _ => valid = false,
                }
            } else {
                reader.next();
            }
        }
        let _ = reader.close();
        if !valid {
            warn!("board: invalid update");
            return Status::BadRequest;
        }

        let level = next.log_level;
        let model = next.board_model_label();
        let status = commit(&self.settings, next);
        if status == Status::Changed {
            log::set_max_level(level_filter(level));
            info!("board: model '{}', log level {}", model, level);
        }
        status
    }
}

impl<C: ConfigPort, P: PlatformPort> Resource for Board<C, P> {
    fn handle(&mut self, method: Method, reader: &mut Pack<'_>, writer: &mut Pack<'_>) -> Status {
        match method {
            Method::Get => match self.write_state(writer) {
                Ok(()) => Status::Content,
                Err(e) => {
                    warn!("board: cannot write state: {}", e);
                    Status::InternalServerError
                }
            },
            Method::Put => self.update(reader),
            _ => Status::MethodNotAllowed,
        }
    }
}

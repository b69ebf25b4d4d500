//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the whole [`SystemConfig`] is one postcard
//! blob under `sensorwatcher/syscfg`, range-checked before every write.
//! ESP-IDF commits each blob atomically.
//!
//! On host targets the blob lives in memory.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{BOARD_MODELS, LOG_LEVEL_MAX, SUPPORTED_BAUD_RATES, SystemConfig};
use crate::rpc::auth::KEY_LENGTH;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &core::ffi::CStr = c"sensorwatcher";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &core::ffi::CStr = c"syscfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    blob: std::cell::RefCell<Option<Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: std::cell::RefCell::new(None),
        })
    }

    /// Run `f` on the config namespace, closing the handle afterwards.
    #[cfg(target_os = "espidf")]
    fn with_config_handle<T>(
        mode: nvs_open_mode_t,
        f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
    ) -> Result<T, i32> {
        let mut handle: nvs_handle_t = 0;
        // SAFETY: the namespace is a NUL-terminated literal and `handle` outlives the call.
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_config_blob() -> Result<Vec<u8>, i32> {
        Self::with_config_handle(nvs_open_mode_t_NVS_READONLY, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut blob = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr(), blob.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            blob.truncate(size);
            Ok(blob)
        })
    }

    #[cfg(target_os = "espidf")]
    fn write_config_blob(blob: &[u8]) -> Result<(), i32> {
        Self::with_config_handle(nvs_open_mode_t_NVS_READWRITE, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, CONFIG_KEY.as_ptr(), blob.as_ptr().cast(), blob.len())
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            match unsafe { nvs_commit(handle) } {
                ESP_OK => Ok(()),
                err => Err(err),
            }
        })
    }
}

/// Range-check every field before it is persisted.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if cfg.log_level > LOG_LEVEL_MAX {
        return Err(ConfigError::ValidationFailed("log_level must be 0-5"));
    }
    if cfg.board_model as usize >= BOARD_MODELS.len() {
        return Err(ConfigError::ValidationFailed("board_model is not a known model"));
    }
    if i32::try_from(cfg.sampling_period_secs).is_err() {
        return Err(ConfigError::ValidationFailed(
            "sampling_period_secs must fit a signed 32-bit integer",
        ));
    }
    let key = cfg.backend_key_hex.as_bytes();
    if !key.is_empty()
        && (key.len() != KEY_LENGTH * 2 || !key.iter().all(u8::is_ascii_hexdigit))
    {
        return Err(ConfigError::ValidationFailed(
            "backend_key_hex must be empty or 128 hex digits",
        ));
    }
    if !SUPPORTED_BAUD_RATES.contains(&cfg.serial_baud_rate) {
        return Err(ConfigError::ValidationFailed(
            "serial_baud_rate is not a supported rate",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if let Some(bytes) = self.blob.borrow().as_deref() {
                let cfg: SystemConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config (simulation)");
                Ok(cfg)
            } else {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            match Self::read_config_blob() {
                Ok(bytes) => {
                    let cfg: SystemConfig =
                        postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(SystemConfig::default())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", e);
                    Ok(SystemConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            *self.blob.borrow_mut() = Some(bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            match Self::write_config_blob(&bytes) {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(ConfigError::StorageFull),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

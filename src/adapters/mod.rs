//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements            | Connects to              |
//! |-------------|-----------------------|--------------------------|
//! | `nvs`       | ConfigPort            | NVS / in-memory blob     |
//! | `time`      | TimePort              | ESP32 system timer, RTC  |
//! | `device_id` | PlatformPort          | eFuse MAC, chip info     |
//! | `serial`    | Transport             | Console UART (espidf)    |
//! | `log_sink`  | log::Log              | Console logger + ring    |

pub mod device_id;
pub mod log_sink;
pub mod nvs;
#[cfg(target_os = "espidf")]
pub mod serial;
pub mod time;

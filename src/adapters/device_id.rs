//! Device identity and chip queries.
//!
//! The device id is the factory MAC read as a big-endian integer and
//! rendered as 16 uppercase hex digits (`%016X`), e.g. `0000DEADBEEFCAFE`.
//! It is deterministic across reboots (eFuse MAC) and is what the `board`
//! resource reports as `id`.

use crate::app::ports::PlatformPort;

/// Fixed-size device ID string: 16 hex digits.
pub type DeviceIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// The MAC as an integer, first byte most significant.
pub fn mac_to_u64(mac: &MacAddress) -> u64 {
    mac.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

/// Format an id as 16 uppercase hex digits.
pub fn format_device_id(id: u64) -> DeviceIdString {
    let mut s = DeviceIdString::new();
    use core::fmt::Write;
    let _ = write!(s, "{:016X}", id);
    s
}

/// Flash size in KiB from a JEDEC id (capacity byte 0x12 = 256 KiB and
/// doubling from there). Unknown codes yield 0.
pub fn flash_size_from_jedec(jedec_id: u32) -> u32 {
    let n = (jedec_id & 0xFF).wrapping_sub(0x12);
    if n < 7 { 0x100 << n } else { 0 }
}

/// [`PlatformPort`] over the running chip.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChipInfo;

impl PlatformPort for ChipInfo {
    fn device_id(&self) -> u64 {
        mac_to_u64(&read_mac())
    }

    #[cfg(target_os = "espidf")]
    fn processor(&self) -> &'static str {
        use esp_idf_svc::sys::*;
        let mut chip: esp_chip_info_t = unsafe { core::mem::zeroed() };
        unsafe { esp_chip_info(&mut chip) };
        match chip.model {
            esp_chip_model_t_CHIP_ESP32 => "ESP32",
            esp_chip_model_t_CHIP_ESP32S2 => "ESP32-S2",
            esp_chip_model_t_CHIP_ESP32S3 => "ESP32-S3",
            esp_chip_model_t_CHIP_ESP32C3 => "ESP32-C3",
            _ => "",
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn processor(&self) -> &'static str {
        "host"
    }

    #[cfg(target_os = "espidf")]
    fn flash_size_kib(&self) -> u32 {
        let mut id: u32 = 0;
        if unsafe { esp_idf_svc::sys::esp_flash_read_id(core::ptr::null_mut(), &mut id) } != 0 {
            return 0;
        }
        flash_size_from_jedec(id)
    }

    #[cfg(not(target_os = "espidf"))]
    fn flash_size_kib(&self) -> u32 {
        0
    }

    #[cfg(target_os = "espidf")]
    fn free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap(&self) -> u32 {
        0
    }

    #[cfg(target_os = "espidf")]
    fn minimum_free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_minimum_free_heap_size() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn minimum_free_heap(&self) -> u32 {
        0
    }
}

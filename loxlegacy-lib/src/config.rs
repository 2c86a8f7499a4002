use crate::dispatch::Route;
use crate::error::LegacyError;
use crate::firmware::Versions;
use crate::frame::DeviceType;
use num_enum::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identity of one extension.
///
/// ```json
/// { "serial": 1193285, "device_type": 1, "hardware_version": 1, "firmware_version": 167772161 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub serial: u32,
    pub device_type: u8,
    pub hardware_version: u8,
    pub firmware_version: u32,
}

impl DeviceConfig {
    pub fn new(serial: u32, device_type: DeviceType, hardware_version: u8, firmware_version: u32) -> Self {
        Self {
            serial,
            device_type: device_type.into(),
            hardware_version,
            firmware_version,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, LegacyError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LegacyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn device_type(&self) -> DeviceType {
        DeviceType::from_primitive(self.device_type)
    }

    pub fn route(&self) -> Route {
        Route::new(self.serial, self.device_type())
    }

    pub fn versions(&self) -> Versions {
        Versions {
            hardware: self.hardware_version,
            firmware: self.firmware_version,
        }
    }
}

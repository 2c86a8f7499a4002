//! Classification of received frames into the five legacy delivery categories.

use crate::constants::{FIRMWARE_BROADCAST_MASK, FIRMWARE_BROADCAST_TAG};
use crate::frame::{Address, DeviceType, Direction, Frame};
use strum_macros::Display;

/// Delivery category of a received frame, relative to one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Category {
    #[strum(to_string = "broadcast-to-all")]
    BroadcastAll,
    #[strum(to_string = "broadcast-to-type")]
    BroadcastType,
    #[strum(to_string = "unicast-to-device")]
    ToDevice,
    #[strum(to_string = "from-device")]
    FromDevice,
    #[strum(to_string = "firmware-broadcast-to-type")]
    FirmwareBroadcast,
}

/// Identity of the extension doing the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub serial: u32,
    pub device_type: DeviceType,
}

impl Route {
    pub fn new(serial: u32, device_type: DeviceType) -> Self {
        Self { serial, device_type }
    }

    /// Classifies `frame`. Checks run in a fixed order and the first match
    /// wins; `None` means the frame is not for this extension.
    ///
    /// Own addresses are compared unmasked, so an out-of-range device type or
    /// serial matches nothing instead of another extension's address.
    ///
    /// `nat` marks frames the transport recognized as NAT traffic. Those, and
    /// device-originated frames outside the broadcast-to-all identifier, are
    /// discarded before classification.
    pub fn classify(&self, frame: &Frame, nat: bool) -> Option<Category> {
        let id = frame.identifier;
        if nat || (frame.direction == Direction::FromDevice && id != 0) {
            return None;
        }

        let type_bits = u32::from(u8::from(self.device_type));
        if id == Address::All.identifier() {
            Some(Category::BroadcastAll)
        } else if id == Address::DeviceType(self.device_type).unmasked_identifier() {
            Some(Category::BroadcastType)
        } else if id == Address::ToDevice(self.serial).unmasked_identifier() {
            Some(Category::ToDevice)
        } else if id == Address::FromDevice(self.serial).unmasked_identifier() {
            Some(Category::FromDevice)
        } else if id & FIRMWARE_BROADCAST_MASK == ((type_bits << 16) | FIRMWARE_BROADCAST_TAG) {
            Some(Category::FirmwareBroadcast)
        } else {
            None
        }
    }
}

use crate::constants::{
    FIRMWARE_BROADCAST_TAG, FRAME_DATA_SIZE, FRAME_PAYLOAD_SIZE, IDENTIFIER_MASK, TO_DEVICE_FLAG,
};
use crate::error::LegacyError;
use bytes::Bytes;
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;
use std::str::FromStr;
use strum_macros::Display;
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Opcodes of the legacy extension protocol.
///
/// Only 7 bits travel on the wire. Anything not listed decodes as `Unknown`
/// and is ignored by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum LegacyCommand {
    #[strum(to_string = "start_request")]
    StartRequest = 0x01,
    #[strum(to_string = "alive")]
    Alive = 0x02,
    #[strum(to_string = "alive_reply")]
    AliveReply = 0x03,
    #[strum(to_string = "identify")]
    Identify = 0x04,
    #[strum(to_string = "identify_LED")]
    IdentifyLed = 0x05,
    #[strum(to_string = "identify_unknown_extensions")]
    IdentifyUnknownExtensions = 0x06,
    #[strum(to_string = "extension_offline")]
    ExtensionOffline = 0x07,
    #[strum(to_string = "park_extension")]
    ParkExtension = 0x08,
    #[strum(to_string = "sync_ticks")]
    SyncTicks = 0x09,
    #[strum(to_string = "sync_date_time")]
    SyncDateTime = 0x0A,
    #[strum(to_string = "LED_flash_position")]
    LedFlashPosition = 0x0B,
    #[strum(to_string = "mute_all")]
    MuteAll = 0x0C,
    #[strum(to_string = "LinkDiagnosis_request")]
    LinkDiagnosisRequest = 0x0D,
    #[strum(to_string = "LinkDiagnosis_reply")]
    LinkDiagnosisReply = 0x0E,

    // firmware update handshake
    #[strum(to_string = "software_update_init")]
    SoftwareUpdateInit = 0x10,
    #[strum(to_string = "software_update_verify")]
    SoftwareUpdateVerify = 0x11,
    #[strum(to_string = "software_update_page_crc")]
    SoftwareUpdatePageCrc = 0x12,
    #[strum(to_string = "reboot_all")]
    RebootAll = 0x13,
    #[strum(to_string = "BC_ACK")]
    BcAck = 0x14,
    #[strum(to_string = "BC_NAK")]
    BcNak = 0x15,

    // fragmented transfers
    #[strum(to_string = "fragmented_package")]
    FragmentedPackage = 0x20,
    #[strum(to_string = "fragmented_package_large_start")]
    FragmentedPackageLargeStart = 0x21,
    #[strum(to_string = "fragmented_package_large_data")]
    FragmentedPackageLargeData = 0x22,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Hardware class of an extension. Part of the broadcast identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum DeviceType {
    #[strum(to_string = "extension")]
    Extension = 0x01,
    #[strum(to_string = "DI extension")]
    DiExtension = 0x02,
    #[strum(to_string = "relay extension")]
    RelayExtension = 0x03,
    #[strum(to_string = "dimmer extension")]
    DimmerExtension = 0x04,

    #[num_enum(catch_all)]
    Other(u8),
}

/// Which side of the bus a frame was sent from, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Direction {
    #[strum(to_string = "to-device")]
    ToDevice,
    #[strum(to_string = "from-device")]
    FromDevice,
}

/// First data byte: 7-bit opcode plus the command direction bit.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandByte {
    pub command: B7,
    pub from_device: bool,
}

/// The 8 data bytes of a legacy frame.
///
/// `value8`, `value16` and `value32` overlay the same 7 bytes that fragmented
/// transfers use as a raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LegacyPayload {
    pub command: u8,
    pub value8: u8,
    pub value16: U16,
    pub value32: U32,
}

/// Addressing forms of the legacy identifier space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Broadcast to every extension on the bus
    All,
    /// Broadcast to every extension of one hardware type
    DeviceType(DeviceType),
    /// Unicast to one extension
    ToDevice(u32),
    /// Sent by one extension
    FromDevice(u32),
    /// Firmware data broadcast to one hardware type; `index` fills the low 16 bits
    Firmware { device_type: DeviceType, index: u16 },
}

impl Address {
    /// The 29-bit identifier for this address.
    pub fn identifier(self) -> u32 {
        self.unmasked_identifier() & IDENTIFIER_MASK
    }

    /// The identifier before it is cut to 29 bits. A device type of 0x20 or
    /// more, or a serial with bit 29 set, lands above the mask and can never
    /// equal a received identifier.
    pub fn unmasked_identifier(self) -> u32 {
        match self {
            Address::All => 0,
            Address::DeviceType(device_type) => u32::from(u8::from(device_type)) << 24,
            Address::ToDevice(serial) => serial | TO_DEVICE_FLAG,
            Address::FromDevice(serial) => serial,
            Address::Firmware { device_type, index } => {
                (u32::from(u8::from(device_type)) << 16) | FIRMWARE_BROADCAST_TAG | u32::from(index)
            }
        }
    }
}

/// One legacy bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// 29-bit extended identifier
    pub identifier: u32,
    pub direction: Direction,
    payload: LegacyPayload,
}

impl Frame {
    /// A frame with zeroed values.
    pub fn new(address: Address, direction: Direction, command: LegacyCommand) -> Self {
        let mut frame = Self {
            identifier: address.identifier(),
            direction,
            payload: LegacyPayload::default(),
        };
        frame.set_command(command, direction == Direction::FromDevice);
        frame
    }

    /// A frame emitted by the extension with the given serial.
    pub fn from_device(serial: u32, command: LegacyCommand) -> Self {
        Self::new(Address::FromDevice(serial), Direction::FromDevice, command)
    }

    /// Builds a frame from raw CAN fields.
    pub fn from_parts(identifier: u32, direction: Direction, data: [u8; FRAME_DATA_SIZE]) -> Self {
        // An 8-byte array always fits the 8-byte payload layout
        let payload = LegacyPayload::read_from_bytes(&data[..]).unwrap_or_default();
        Self {
            identifier: identifier & IDENTIFIER_MASK,
            direction,
            payload,
        }
    }

    /// Parses the CAN data field of a received frame.
    pub fn decode(identifier: u32, direction: Direction, data: &[u8]) -> Result<Self, LegacyError> {
        let data: [u8; FRAME_DATA_SIZE] = data.try_into().map_err(|_| LegacyError::InvalidLength {
            expected: FRAME_DATA_SIZE,
            actual: data.len(),
        })?;
        Ok(Self::from_parts(identifier, direction, data))
    }

    pub fn with_values(mut self, value8: u8, value16: u16, value32: u32) -> Self {
        self.payload.value8 = value8;
        self.payload.value16 = U16::new(value16);
        self.payload.value32 = U32::new(value32);
        self
    }

    pub fn with_data(mut self, data: [u8; FRAME_PAYLOAD_SIZE]) -> Self {
        self.payload.as_mut_bytes()[1..].copy_from_slice(&data);
        self
    }

    fn command_byte(&self) -> CommandByte {
        CommandByte::from_bytes([self.payload.command])
    }

    fn set_command(&mut self, command: LegacyCommand, from_device: bool) {
        let byte = CommandByte::new()
            .with_command(u8::from(command) & 0x7F)
            .with_from_device(from_device);
        self.payload.command = byte.into_bytes()[0];
    }

    pub fn command(&self) -> LegacyCommand {
        LegacyCommand::from_primitive(self.command_byte().command())
    }

    /// Direction bit carried inside the command byte.
    pub fn command_direction(&self) -> Direction {
        if self.command_byte().from_device() {
            Direction::FromDevice
        } else {
            Direction::ToDevice
        }
    }

    pub fn value8(&self) -> u8 {
        self.payload.value8
    }

    pub fn value16(&self) -> u16 {
        self.payload.value16.get()
    }

    pub fn value32(&self) -> u32 {
        self.payload.value32.get()
    }

    /// The 7 bytes following the command byte.
    pub fn data(&self) -> [u8; FRAME_PAYLOAD_SIZE] {
        let mut data = [0u8; FRAME_PAYLOAD_SIZE];
        data.copy_from_slice(&self.payload.as_bytes()[1..]);
        data
    }

    /// The full 8-byte CAN data field.
    pub fn to_bytes(&self) -> [u8; FRAME_DATA_SIZE] {
        let mut bytes = [0u8; FRAME_DATA_SIZE];
        bytes.copy_from_slice(self.payload.as_bytes());
        bytes
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        Bytes::copy_from_slice(&frame.to_bytes())
    }
}

/// candump notation: `IIIIIIII#DDDDDDDDDDDDDDDD`
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}#{}", self.identifier, hex::encode_upper(self.to_bytes()))
    }
}

/// Parses candump notation. The receive direction is taken from the command
/// direction bit since the text form does not carry it.
impl FromStr for Frame {
    type Err = LegacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, data) = s
            .trim()
            .split_once('#')
            .ok_or_else(|| LegacyError::InvalidFrame(format!("missing '#' in {s:?}")))?;
        let identifier = u32::from_str_radix(id, 16)
            .map_err(|e| LegacyError::InvalidFrame(format!("bad identifier {id:?}: {e}")))?;
        if identifier > IDENTIFIER_MASK {
            return Err(LegacyError::InvalidFrame(format!(
                "identifier {identifier:#X} exceeds 29 bits"
            )));
        }
        let bytes = hex::decode(data)?;
        let mut frame = Self::decode(identifier, Direction::ToDevice, &bytes)?;
        frame.direction = frame.command_direction();
        Ok(frame)
    }
}

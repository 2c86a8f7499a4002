// Protocol constants for the legacy extension bus

/// Mask of the 29 bits that make up an extended CAN identifier
pub const IDENTIFIER_MASK: u32 = 0x1FFF_FFFF;

/// Set on identifiers addressed to a single device
pub const TO_DEVICE_FLAG: u32 = 0x1000_0000;

/// Marks the firmware broadcast range of a device type
pub const FIRMWARE_BROADCAST_TAG: u32 = 0x1F00_0000;

/// Mask applied before comparing against the firmware broadcast range
pub const FIRMWARE_BROADCAST_MASK: u32 = 0x1FFF_0000;

/// Size of the CAN data field of a legacy frame
pub const FRAME_DATA_SIZE: usize = 8;

/// Size of the payload that aliases value8/value16/value32
pub const FRAME_PAYLOAD_SIZE: usize = 7;

/// value16 marker that forces an update or reboot regardless of versions
pub const FORCE_UPDATE_MAGIC: u16 = 0xDEAD;

/// Timer period in milliseconds
pub const TICK_PERIOD_MS: i32 = 10;

/// Heartbeat base interval in seconds (six minutes)
pub const HEARTBEAT_BASE_SECS: u32 = 6 * 60;

/// Serial bits used to spread heartbeats across devices
pub const HEARTBEAT_JITTER_MASK: u32 = 0x3F;

/// Data bytes carried by a small-tier fragment (one byte is the index)
pub const SMALL_FRAGMENT_DATA: usize = 6;

/// Data bytes carried by a large-tier fragment
pub const LARGE_FRAGMENT_DATA: usize = 7;

/// Largest transfer that fits the small tier (255 indexed fragments)
pub const SMALL_TIER_MAX: usize = 255 * SMALL_FRAGMENT_DATA;

/// Largest transfer the 16-bit length field can describe
pub const LARGE_TIER_MAX: usize = 0xFFFF;

/// Number of flash pages whose CRC is collected during an update
pub const FIRMWARE_PAGE_COUNT: usize = 128;

//! Common test utilities: recording collaborators and frame builders

// Shared across several test files - not all items are used in every one
#![allow(dead_code)]

#[allow(unused_imports)]
pub use loxlegacy_lib::config::DeviceConfig;
#[allow(unused_imports)]
pub use loxlegacy_lib::error::LegacyError;
#[allow(unused_imports)]
pub use loxlegacy_lib::extension::LegacyExtension;
#[allow(unused_imports)]
pub use loxlegacy_lib::fragment::{FragmentCommand, FragmentHeader, checksum16};
#[allow(unused_imports)]
pub use loxlegacy_lib::frame::{Address, DeviceType, Direction, Frame, LegacyCommand};
#[allow(unused_imports)]
pub use loxlegacy_lib::lifecycle::DeviceState;
#[allow(unused_imports)]
pub use loxlegacy_lib::platform::{Color, Indicator, ResetLine, Transport};

pub const SERIAL: u32 = 0x0001_2345;
pub const DEVICE_TYPE: DeviceType = DeviceType::Extension;
pub const HARDWARE_VERSION: u8 = 1;
pub const FIRMWARE_VERSION: u32 = 0x0A00_0001;

#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<Frame>,
    pub receive_errors: u32,
    pub transmit_errors: u32,
    pub total_errors: u32,
    /// identifiers reported as NAT traffic
    pub nat_identifiers: Vec<u32>,
}

impl Transport for RecordingTransport {
    fn send(&mut self, frame: Frame) {
        self.sent.push(frame);
    }

    fn receive_error_count(&self) -> u32 {
        self.receive_errors
    }

    fn transmit_error_count(&self) -> u32 {
        self.transmit_errors
    }

    fn total_error_count(&self) -> u32 {
        self.total_errors
    }

    fn is_nat_frame(&self, frame: &Frame) -> bool {
        self.nat_identifiers.contains(&frame.identifier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedEvent {
    IdentifyOn,
    IdentifyOff,
    Pulse(Color),
    SyncTicks(u32),
    SyncOffset(u32),
}

#[derive(Debug, Default)]
pub struct RecordingIndicator {
    pub events: Vec<LedEvent>,
}

impl Indicator for RecordingIndicator {
    fn identify_on(&mut self) {
        self.events.push(LedEvent::IdentifyOn);
    }

    fn identify_off(&mut self) {
        self.events.push(LedEvent::IdentifyOff);
    }

    fn pulse(&mut self, color: Color) {
        self.events.push(LedEvent::Pulse(color));
    }

    fn sync_ticks(&mut self, ticks: u32) {
        self.events.push(LedEvent::SyncTicks(ticks));
    }

    fn set_sync_offset(&mut self, offset: u32) {
        self.events.push(LedEvent::SyncOffset(offset));
    }
}

#[derive(Debug, Default)]
pub struct RecordingReset {
    pub resets: usize,
}

impl ResetLine for RecordingReset {
    fn reset(&mut self) {
        self.resets += 1;
    }
}

pub type TestExtension = LegacyExtension<RecordingTransport, RecordingIndicator, RecordingReset>;

pub fn config() -> DeviceConfig {
    DeviceConfig::new(SERIAL, DEVICE_TYPE, HARDWARE_VERSION, FIRMWARE_VERSION)
}

/// Freshly booted extension
pub fn extension() -> TestExtension {
    LegacyExtension::new(
        config(),
        RecordingTransport::default(),
        RecordingIndicator::default(),
        RecordingReset::default(),
    )
}

/// Extension placed online by the controller, with recordings cleared
pub fn online_extension() -> TestExtension {
    let mut ext = extension();
    ext.receive(&unicast(LegacyCommand::LedFlashPosition, 0, 0, 0));
    assert_eq!(ext.state(), DeviceState::Online);
    clear(&mut ext);
    ext
}

pub fn clear(ext: &mut TestExtension) {
    ext.transport_mut().sent.clear();
}

pub fn unicast(command: LegacyCommand, value8: u8, value16: u16, value32: u32) -> Frame {
    Frame::new(Address::ToDevice(SERIAL), Direction::ToDevice, command).with_values(value8, value16, value32)
}

pub fn broadcast_all(command: LegacyCommand, value32: u32) -> Frame {
    Frame::new(Address::All, Direction::ToDevice, command).with_values(0, 0, value32)
}

pub fn broadcast_type(command: LegacyCommand, value8: u8, value16: u16, value32: u32) -> Frame {
    Frame::new(Address::DeviceType(DEVICE_TYPE), Direction::ToDevice, command).with_values(value8, value16, value32)
}

pub fn sent_commands(ext: &TestExtension) -> Vec<LegacyCommand> {
    ext.transport().sent.iter().map(Frame::command).collect()
}

/// Observable state of an extension, for before/after comparisons
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: DeviceState,
    pub muted: bool,
    pub identified: bool,
    pub start_pending: bool,
    pub countdown_ms: Option<i32>,
    pub update_active: bool,
    pub sent: usize,
    pub led_events: usize,
    pub resets: usize,
}

pub fn snapshot(ext: &TestExtension) -> Snapshot {
    Snapshot {
        state: ext.state(),
        muted: ext.is_muted(),
        identified: ext.is_identified(),
        start_pending: ext.liveness().start_pending(),
        countdown_ms: ext.liveness().countdown_ms(),
        update_active: ext.firmware_update_active(),
        sent: ext.transport().sent.len(),
        led_events: ext.indicator().events.len(),
        resets: ext.reset_line().resets,
    }
}

use crate::config::DeviceConfig;
use crate::dispatch::{Category, Route};
use crate::error::LegacyError;
use crate::firmware::{FirmwareVerifier, HandshakeAction, UnimplementedVerifier, UpdatePhase, UpdateSession, Versions};
use crate::fragment::{FragmentCommand, FragmentStream};
use crate::frame::{Frame, LegacyCommand};
use crate::lifecycle::{DeviceState, Lifecycle};
use crate::liveness::Liveness;
use crate::platform::{Color, Indicator, ResetLine, Transport};
use tracing::{debug, info, trace};

/// One legacy extension: lifecycle, heartbeat, update handshake and
/// fragmented sends on top of a transport.
///
/// All state changes go through [`receive`](Self::receive) and
/// [`timer_10ms`](Self::timer_10ms), which take `&mut self`; callers that
/// drive both from separate contexts serialize them through
/// [`crate::actor`].
pub struct LegacyExtension<T, I, R> {
    route: Route,
    versions: Versions,
    lifecycle: Lifecycle,
    liveness: Liveness,
    update: UpdatePhase,
    halted: bool,
    transport: T,
    indicator: I,
    reset_line: R,
    verifier: Box<dyn FirmwareVerifier + Send>,
}

impl<T: Transport, I: Indicator, R: ResetLine> LegacyExtension<T, I, R> {
    /// Boots the extension: offline, orphaned, start request pending.
    pub fn new(config: DeviceConfig, transport: T, mut indicator: I, reset_line: R) -> Self {
        indicator.identify_off();
        indicator.pulse(Color::Red);
        info!(serial = config.serial, device_type = %config.device_type(), "extension started");
        Self {
            route: config.route(),
            versions: config.versions(),
            lifecycle: Lifecycle::new(),
            liveness: Liveness::new(config.serial),
            update: UpdatePhase::Idle,
            halted: false,
            transport,
            indicator,
            reset_line,
            verifier: Box::new(UnimplementedVerifier),
        }
    }

    /// Replaces the CRC validation hook.
    pub fn with_verifier(mut self, verifier: impl FirmwareVerifier + Send + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn serial(&self) -> u32 {
        self.route.serial
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn versions(&self) -> Versions {
        self.versions
    }

    pub fn state(&self) -> DeviceState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    pub fn is_muted(&self) -> bool {
        self.lifecycle.is_muted()
    }

    pub fn is_identified(&self) -> bool {
        self.lifecycle.is_identified()
    }

    pub fn firmware_update_active(&self) -> bool {
        self.update.is_active()
    }

    pub fn update_session(&self) -> Option<&UpdateSession> {
        self.update.session()
    }

    /// True once a reset was requested; every later stimulus is ignored.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn reset_line(&self) -> &R {
        &self.reset_line
    }

    fn send_with_values(&mut self, command: LegacyCommand, value8: u8, value16: u16, value32: u32) {
        let frame = Frame::from_device(self.route.serial, command).with_values(value8, value16, value32);
        trace!(%frame, %command, "send");
        self.transport.send(frame);
    }

    /// value16 is the configuration bitmask, always 0 here.
    fn send_with_version(&mut self, command: LegacyCommand) {
        self.send_with_values(command, self.versions.hardware, 0, self.versions.firmware);
    }

    /// Sends `payload` as a fragmented transfer and returns the number of
    /// frames handed to the transport.
    ///
    /// Refused while offline, except for [`FragmentCommand::PageCrcExternal`].
    /// Payloads of 64 KiB or more are refused. A refusal emits no frame; the
    /// returned error is informational and callers are free to ignore it.
    pub fn send_fragmented_data(&mut self, command: FragmentCommand, payload: &[u8]) -> Result<usize, LegacyError> {
        if self.halted {
            return Ok(0);
        }
        if !self.lifecycle.is_online() && command != FragmentCommand::PageCrcExternal {
            return Err(LegacyError::NotOnline);
        }
        let stream = FragmentStream::new(command, payload)?;
        debug!(%command, tier = %stream.tier(), len = payload.len(), fragments = stream.len(), "fragmented send");
        let mut sent = 0;
        for fragment in stream {
            let frame = Frame::from_device(self.route.serial, fragment.command).with_data(fragment.data);
            self.transport.send(frame);
            sent += 1;
        }
        Ok(sent)
    }

    /// 10 ms timer entry point.
    pub fn timer_10ms(&mut self) {
        if self.halted {
            return;
        }
        if let Some(heartbeat) = self.liveness.tick() {
            debug!(%heartbeat, "heartbeat");
            self.send_with_version(heartbeat);
        }
    }

    /// Receive entry point, called once per frame from the transport.
    pub fn receive(&mut self, frame: &Frame) {
        if self.halted {
            return;
        }
        let nat = self.transport.is_nat_frame(frame);
        match self.route.classify(frame, nat) {
            Some(Category::BroadcastAll) => self.broadcast_all(frame),
            Some(Category::BroadcastType) => self.broadcast_type(frame),
            Some(Category::ToDevice) => self.to_device(frame),
            // our own traffic
            Some(Category::FromDevice) => {}
            // firmware payload is consumed elsewhere
            Some(Category::FirmwareBroadcast) => {}
            None => {}
        }
    }

    fn park(&mut self) {
        info!(serial = self.route.serial, "parked");
        self.lifecycle.park();
        self.indicator.pulse(Color::Orange);
    }

    fn broadcast_all(&mut self, frame: &Frame) {
        match frame.command() {
            LegacyCommand::IdentifyLed => self.indicator.identify_off(),
            LegacyCommand::IdentifyUnknownExtensions => {
                self.lifecycle.unmute();
                if !self.lifecycle.is_identified() {
                    self.liveness.request_start();
                }
            }
            LegacyCommand::ExtensionOffline | LegacyCommand::ParkExtension => self.park(),
            LegacyCommand::SyncTicks => self.indicator.sync_ticks(frame.value32()),
            LegacyCommand::SyncDateTime => {}
            _ => {}
        }
    }

    fn broadcast_type(&mut self, frame: &Frame) {
        match frame.command() {
            LegacyCommand::MuteAll => {
                info!(serial = self.route.serial, "muted");
                self.lifecycle.mute();
            }
            command => {
                if command == LegacyCommand::RebootAll {
                    self.lifecycle.unmute();
                }
                let action = self.update.handle(frame, self.versions);
                self.apply(action);
            }
        }
    }

    fn apply(&mut self, action: HandshakeAction) {
        match action {
            HandshakeAction::None => {}
            HandshakeAction::Ack => self.send_with_version(LegacyCommand::BcAck),
            HandshakeAction::Nak => self.send_with_version(LegacyCommand::BcNak),
            HandshakeAction::Reset => {
                info!(serial = self.route.serial, "hardware reset");
                self.halted = true;
                self.reset_line.reset();
            }
            HandshakeAction::Verify { candidate } => {
                if let Some(session) = self.update.session() {
                    self.verifier.verify(candidate, session.page_crcs());
                }
            }
        }
    }

    fn to_device(&mut self, frame: &Frame) {
        match frame.command() {
            LegacyCommand::Identify => {
                info!(serial = self.route.serial, "identified");
                self.lifecycle.identify();
                self.liveness.request_start();
                self.update.cancel();
                self.indicator.pulse(Color::Green);
            }
            LegacyCommand::IdentifyLed => self.indicator.identify_on(),
            LegacyCommand::Alive => {
                self.send_with_version(LegacyCommand::AliveReply);
                self.indicator.pulse(Color::Green);
            }
            LegacyCommand::ExtensionOffline | LegacyCommand::ParkExtension => self.park(),
            LegacyCommand::LedFlashPosition => {
                if !self.lifecycle.is_online() {
                    info!(serial = self.route.serial, "online");
                }
                self.lifecycle.go_online();
                self.indicator.set_sync_offset(frame.value32());
            }
            LegacyCommand::AliveReply => self.indicator.pulse(Color::Green),
            LegacyCommand::LinkDiagnosisRequest => {
                let rx = self.transport.receive_error_count() & 0x7F;
                let tx = self.transport.transmit_error_count() & 0x7F;
                let total = self.transport.total_error_count();
                self.send_with_values(LegacyCommand::LinkDiagnosisReply, 0, (rx | (tx << 8)) as u16, total);
            }
            LegacyCommand::MuteAll => {
                info!(serial = self.route.serial, "muted");
                self.lifecycle.mute();
                self.indicator.pulse(Color::Green);
            }
            _ => {}
        }
    }
}

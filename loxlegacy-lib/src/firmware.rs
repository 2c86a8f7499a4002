use crate::constants::{FIRMWARE_PAGE_COUNT, FORCE_UPDATE_MAGIC};
use crate::frame::{Frame, LegacyCommand};
use tracing::{debug, info, warn};

/// Version pair of the running extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versions {
    pub hardware: u8,
    pub firmware: u32,
}

/// Data collected while an update is armed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSession {
    candidate: Option<u32>,
    page_crcs: [u32; FIRMWARE_PAGE_COUNT],
}

impl UpdateSession {
    fn new() -> Self {
        Self {
            candidate: None,
            page_crcs: [0; FIRMWARE_PAGE_COUNT],
        }
    }

    /// Version announced by `software_update_verify`, once seen.
    pub fn candidate(&self) -> Option<u32> {
        self.candidate
    }

    pub fn page_crcs(&self) -> &[u32] {
        &self.page_crcs
    }

    pub fn page_crc(&self, page: usize) -> Option<u32> {
        self.page_crcs.get(page).copied()
    }

    /// Stores a page CRC. Pages outside the table are dropped.
    fn store_page_crc(&mut self, page: u16, crc: u32) -> bool {
        match self.page_crcs.get_mut(usize::from(page)) {
            Some(slot) => {
                *slot = crc;
                true
            }
            None => false,
        }
    }
}

/// Firmware update handshake state.
///
/// Page CRCs only exist while an update is armed, so nothing can be stored
/// without a preceding accepted `software_update_init`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Idle,
    Active(Box<UpdateSession>),
}

/// What the extension must do after a handshake frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeAction {
    None,
    /// Reply `BC_ACK` with our versions
    Ack,
    /// Reply `BC_NAK` with our versions
    Nak,
    /// Restart into the new firmware
    Reset,
    /// Page CRCs should be checked against the flashed image
    Verify { candidate: u32 },
}

/// Hook for validating collected page CRCs against the staged image.
pub trait FirmwareVerifier {
    fn verify(&mut self, candidate: u32, page_crcs: &[u32]);
}

/// Default verifier. CRC validation of staged images is not implemented.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedVerifier;

impl FirmwareVerifier for UnimplementedVerifier {
    fn verify(&mut self, candidate: u32, page_crcs: &[u32]) {
        warn!(
            candidate,
            pages = page_crcs.len(),
            "firmware CRC validation is not implemented"
        );
    }
}

fn forced_or_new(frame: &Frame, versions: Versions) -> bool {
    frame.value16() == FORCE_UPDATE_MAGIC || frame.value32() != versions.firmware
}

impl UpdatePhase {
    pub fn is_active(&self) -> bool {
        matches!(self, UpdatePhase::Active(_))
    }

    pub fn session(&self) -> Option<&UpdateSession> {
        match self {
            UpdatePhase::Idle => None,
            UpdatePhase::Active(session) => Some(&**session),
        }
    }

    /// Drops any armed update.
    pub fn cancel(&mut self) {
        *self = UpdatePhase::Idle;
    }

    /// Handles one broadcast-to-type handshake frame.
    ///
    /// `mute_all` is not part of the handshake and is left to the caller.
    pub fn handle(&mut self, frame: &Frame, versions: Versions) -> HandshakeAction {
        match frame.command() {
            LegacyCommand::SoftwareUpdateInit => self.init(frame, versions),
            LegacyCommand::RebootAll => {
                self.cancel();
                if forced_or_new(frame, versions) {
                    info!(version = frame.value32(), "rebooting into new firmware");
                    HandshakeAction::Reset
                } else {
                    HandshakeAction::None
                }
            }
            LegacyCommand::SoftwareUpdateVerify => self.verify(frame, versions),
            LegacyCommand::SoftwareUpdatePageCrc => {
                if let UpdatePhase::Active(session) = self {
                    if !session.store_page_crc(frame.value16(), frame.value32()) {
                        debug!(page = frame.value16(), "page CRC index out of range, dropped");
                    }
                }
                HandshakeAction::None
            }
            _ => HandshakeAction::None,
        }
    }

    fn init(&mut self, frame: &Frame, versions: Versions) -> HandshakeAction {
        self.cancel();
        if frame.value8() > versions.hardware {
            debug!(
                announced = frame.value8(),
                ours = versions.hardware,
                "update targets newer hardware, ignored"
            );
            return HandshakeAction::None;
        }
        if forced_or_new(frame, versions) {
            info!(version = frame.value32(), "firmware update armed");
            *self = UpdatePhase::Active(Box::new(UpdateSession::new()));
            HandshakeAction::Ack
        } else {
            HandshakeAction::Nak
        }
    }

    fn verify(&mut self, frame: &Frame, versions: Versions) -> HandshakeAction {
        let UpdatePhase::Active(session) = self else {
            return HandshakeAction::None;
        };
        let candidate = frame.value32();
        session.candidate = Some(candidate);
        let eligible = match frame.value8() {
            0 => candidate != versions.firmware,
            1 => true,
            _ => false,
        };
        if eligible {
            HandshakeAction::Verify { candidate }
        } else {
            HandshakeAction::None
        }
    }
}

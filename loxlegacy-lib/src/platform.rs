//! Collaborators the protocol engine drives but does not own: the CAN
//! transport, the status LED and the hardware reset line.

use crate::frame::Frame;
use strum_macros::Display;

/// CAN transport of the extension.
pub trait Transport {
    /// Queues one frame for transmission. Must not block.
    fn send(&mut self, frame: Frame);

    fn receive_error_count(&self) -> u32;

    fn transmit_error_count(&self) -> u32;

    fn total_error_count(&self) -> u32;

    /// Whether a received frame is NAT traffic that merely shares the legacy
    /// identifier space. Transports with a correct receive filter never
    /// deliver such frames.
    fn is_nat_frame(&self, _frame: &Frame) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Color {
    #[strum(to_string = "red")]
    Red,
    #[strum(to_string = "green")]
    Green,
    #[strum(to_string = "orange")]
    Orange,
}

/// Status LED. Fire-and-forget.
pub trait Indicator {
    fn identify_on(&mut self);

    fn identify_off(&mut self);

    fn pulse(&mut self, color: Color);

    fn sync_ticks(&mut self, ticks: u32);

    fn set_sync_offset(&mut self, offset: u32);
}

/// Hardware reset. On real hardware `reset` does not return; the engine
/// stops handling stimuli once it has been called.
pub trait ResetLine {
    fn reset(&mut self);
}

//! Host-side stand-ins for the extension's hardware collaborators.

use loxlegacy_lib::Frame;
use loxlegacy_lib::platform::{Color, Indicator, ResetLine, Transport};
use tracing::{debug, info, warn};

/// Prints every transmitted frame to stdout in candump notation.
#[derive(Debug, Default)]
pub struct PrintTransport {
    pub sent: usize,
}

impl Transport for PrintTransport {
    fn send(&mut self, frame: Frame) {
        self.sent += 1;
        debug!(command = %frame.command(), "tx");
        println!("{frame}");
    }

    // a simulated bus never errors
    fn receive_error_count(&self) -> u32 {
        0
    }

    fn transmit_error_count(&self) -> u32 {
        0
    }

    fn total_error_count(&self) -> u32 {
        0
    }
}

#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn identify_on(&mut self) {
        info!("LED: identify on");
    }

    fn identify_off(&mut self) {
        debug!("LED: identify off");
    }

    fn pulse(&mut self, color: Color) {
        debug!(%color, "LED: pulse");
    }

    fn sync_ticks(&mut self, ticks: u32) {
        debug!(ticks, "LED: sync ticks");
    }

    fn set_sync_offset(&mut self, offset: u32) {
        debug!(offset, "LED: sync offset");
    }
}

#[derive(Debug, Default)]
pub struct LogReset {
    pub requested: bool,
}

impl ResetLine for LogReset {
    fn reset(&mut self) {
        warn!("hardware reset requested, simulation halts");
        self.requested = true;
    }
}

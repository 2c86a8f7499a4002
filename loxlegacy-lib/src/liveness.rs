use crate::constants::{HEARTBEAT_BASE_SECS, HEARTBEAT_JITTER_MASK, TICK_PERIOD_MS};
use crate::frame::LegacyCommand;

/// Heartbeat interval for a serial, in milliseconds.
///
/// The low six serial bits add up to 63 s on top of the six minute base so
/// extensions on one bus do not announce in lockstep.
pub fn heartbeat_interval_ms(serial: u32) -> i32 {
    (1000 * ((serial & HEARTBEAT_JITTER_MASK) + HEARTBEAT_BASE_SECS)) as i32
}

/// What the next announcement will be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schedule {
    /// A `start_request` goes out on the next tick
    StartPending,
    /// Milliseconds left until the next `alive`
    Countdown(i32),
}

/// Periodic startup/alive announcements, driven by a 10 ms tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    interval_ms: i32,
    schedule: Schedule,
}

impl Liveness {
    /// Starts with a pending startup announcement.
    pub fn new(serial: u32) -> Self {
        Self {
            interval_ms: heartbeat_interval_ms(serial),
            schedule: Schedule::StartPending,
        }
    }

    pub fn interval_ms(&self) -> i32 {
        self.interval_ms
    }

    pub fn start_pending(&self) -> bool {
        self.schedule == Schedule::StartPending
    }

    /// Remaining countdown, `None` while a start request is pending.
    pub fn countdown_ms(&self) -> Option<i32> {
        match self.schedule {
            Schedule::StartPending => None,
            Schedule::Countdown(ms) => Some(ms),
        }
    }

    /// Request a `start_request` on the next tick.
    pub fn request_start(&mut self) {
        self.schedule = Schedule::StartPending;
    }

    /// Advances by one tick and returns the heartbeat to emit, if any.
    pub fn tick(&mut self) -> Option<LegacyCommand> {
        let (beat, remaining) = match self.schedule {
            Schedule::StartPending => (Some(LegacyCommand::StartRequest), self.interval_ms),
            Schedule::Countdown(ms) if ms <= 0 => (Some(LegacyCommand::Alive), self.interval_ms),
            Schedule::Countdown(ms) => (None, ms),
        };
        self.schedule = Schedule::Countdown(remaining - TICK_PERIOD_MS);
        beat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_uses_low_serial_bits() {
        assert_eq!(heartbeat_interval_ms(0), 360_000);
        assert_eq!(heartbeat_interval_ms(0x12345), 365_000);
        assert_eq!(heartbeat_interval_ms(0xFFFF_FFFF), 423_000);
    }

    #[test]
    fn test_first_tick_announces_start() {
        let mut liveness = Liveness::new(0x12345);
        assert!(liveness.start_pending());
        assert_eq!(liveness.tick(), Some(LegacyCommand::StartRequest));
        assert!(!liveness.start_pending());
        assert_eq!(liveness.countdown_ms(), Some(365_000 - 10));
    }

    #[test]
    fn test_alive_after_full_interval() {
        let mut liveness = Liveness::new(0);
        assert_eq!(liveness.tick(), Some(LegacyCommand::StartRequest));
        // 360 s of ticks without a heartbeat
        for _ in 1..36_000 {
            assert_eq!(liveness.tick(), None);
        }
        assert_eq!(liveness.tick(), Some(LegacyCommand::Alive));
        assert_eq!(liveness.countdown_ms(), Some(360_000 - 10));
    }

    #[test]
    fn test_request_start_overrides_countdown() {
        let mut liveness = Liveness::new(7);
        liveness.tick();
        liveness.tick();
        liveness.request_start();
        assert_eq!(liveness.tick(), Some(LegacyCommand::StartRequest));
        assert_eq!(liveness.countdown_ms(), Some(367_000 - 10));
    }
}

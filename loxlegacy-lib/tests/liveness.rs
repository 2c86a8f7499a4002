//! Tests for the heartbeat timer

mod common;

use common::*;
use loxlegacy_lib::liveness::heartbeat_interval_ms;

fn tick_until_sent(ext: &mut TestExtension, max_ticks: usize) -> Option<usize> {
    for n in 1..=max_ticks {
        ext.timer_10ms();
        if !ext.transport().sent.is_empty() {
            return Some(n);
        }
    }
    None
}

#[test]
fn test_first_tick_sends_start_request() {
    let mut ext = extension();
    ext.timer_10ms();

    let sent = &ext.transport().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command(), LegacyCommand::StartRequest);
    assert_eq!(sent[0].identifier, SERIAL);
    assert_eq!(sent[0].value8(), HARDWARE_VERSION);
    assert_eq!(sent[0].value16(), 0);
    assert_eq!(sent[0].value32(), FIRMWARE_VERSION);
    assert!(!ext.liveness().start_pending());
    // re-armed to 1000 * ((serial & 0x3F) + 360), minus the tick itself
    assert_eq!(ext.liveness().countdown_ms(), Some(365_000 - 10));
}

#[test]
fn test_alive_after_one_interval() {
    let interval = heartbeat_interval_ms(SERIAL);
    assert_eq!(interval, 1000 * (((SERIAL & 0x3F) as i32) + 360));
    let ticks_per_interval = (interval / 10) as usize;

    let mut ext = extension();
    ext.timer_10ms();
    clear(&mut ext);

    // nothing for `interval` ms, then exactly one alive
    let fired_at = tick_until_sent(&mut ext, ticks_per_interval + 5).expect("no heartbeat");
    assert_eq!(fired_at, ticks_per_interval);
    assert_eq!(sent_commands(&ext), vec![LegacyCommand::Alive]);
    assert_eq!(ext.liveness().countdown_ms(), Some(interval - 10));

    // and again after the same interval
    clear(&mut ext);
    let fired_at = tick_until_sent(&mut ext, ticks_per_interval + 5).expect("no second heartbeat");
    assert_eq!(fired_at, ticks_per_interval);
    assert_eq!(sent_commands(&ext), vec![LegacyCommand::Alive]);
}

#[test]
fn test_jitter_spreads_intervals() {
    let intervals: std::collections::HashSet<i32> = (0u32..64).map(heartbeat_interval_ms).collect();
    assert_eq!(intervals.len(), 64);
    assert_eq!(heartbeat_interval_ms(64), heartbeat_interval_ms(0));
}

#[test]
fn test_identify_schedules_immediate_start_request() {
    let mut ext = extension();
    ext.timer_10ms();
    ext.timer_10ms();
    clear(&mut ext);

    ext.receive(&unicast(LegacyCommand::Identify, 0, 0, 0));
    ext.timer_10ms();
    assert_eq!(sent_commands(&ext), vec![LegacyCommand::StartRequest]);
}

#[test]
fn test_muted_extension_keeps_heartbeat() {
    let mut ext = extension();
    ext.receive(&broadcast_type(LegacyCommand::MuteAll, 0, 0, 0));
    ext.timer_10ms();
    assert_eq!(sent_commands(&ext), vec![LegacyCommand::StartRequest]);
}

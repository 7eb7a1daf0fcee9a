//! AppService → PumpController → relays, driven by decoded commands.

use crate::mock_hw::{MockRelays, RecordingSink};

use irrigation::app::commands::AppCommand;
use irrigation::app::events::AppEvent;
use irrigation::app::ports::RelayPort;
use irrigation::app::service::AppService;
use irrigation::config::SystemConfig;
use irrigation::control::channel::PumpChannel::{Pump1, Pump2};
use irrigation::control::pump::StatusReason;
use irrigation::error::ControlError;

fn make_app() -> (AppService, MockRelays, RecordingSink) {
    let mut app = AppService::new(SystemConfig::default());
    let mut relays = MockRelays::new();
    let mut sink = RecordingSink::new();
    app.start(&mut relays, &mut sink);
    (app, relays, sink)
}

fn start(channel: irrigation::control::channel::PumpChannel, ms: Option<i64>) -> AppCommand {
    AppCommand::Start {
        channel,
        duration_ms: ms,
    }
}

#[test]
fn start_forces_relays_off_and_announces() {
    let (_app, relays, sink) = make_app();
    assert_eq!(relays.calls, vec![(Pump1, false), (Pump2, false)]);
    assert_eq!(sink.events, vec![AppEvent::Started]);
}

#[test]
fn start_without_duration_uses_default() {
    let (mut app, mut relays, mut sink) = make_app();

    app.handle_command(start(Pump1, None), 0, &mut relays, &mut sink)
        .unwrap();
    let r = sink.last_status(Pump1).unwrap();
    assert!(r.running);
    assert_eq!(r.remaining_ms, 30_000);
    assert!(relays.is_on(Pump1));
    assert!(!relays.is_on(Pump2));

    app.tick(29_999, None, &mut relays, &mut sink);
    assert!(relays.is_on(Pump1));
    app.tick(30_000, None, &mut relays, &mut sink);
    assert!(!relays.is_on(Pump1));
    assert_eq!(sink.last_status(Pump1).unwrap().last_reason, StatusReason::Completed);
}

#[test]
fn non_positive_duration_never_energises() {
    let (mut app, mut relays, mut sink) = make_app();

    for bad in [0, -5] {
        assert_eq!(
            app.handle_command(start(Pump2, Some(bad)), 0, &mut relays, &mut sink),
            Err(ControlError::InvalidDuration)
        );
    }
    assert_eq!(relays.activations(Pump2), 0);
    let r = sink.last_status(Pump2).unwrap();
    assert!(!r.running);
    assert_eq!(r.last_reason, StatusReason::Rejected);
    assert_eq!(r.last_error, Some(ControlError::InvalidDuration));
    assert_eq!(sink.rejections(), 2);
}

#[test]
fn stop_is_idempotent() {
    let (mut app, mut relays, mut sink) = make_app();
    app.handle_command(start(Pump1, Some(10_000)), 0, &mut relays, &mut sink)
        .unwrap();

    app.handle_command(AppCommand::Stop { channel: Pump1 }, 100, &mut relays, &mut sink)
        .unwrap();
    assert_eq!(sink.last_status(Pump1).unwrap().last_reason, StatusReason::Stopped);

    app.handle_command(AppCommand::Stop { channel: Pump1 }, 200, &mut relays, &mut sink)
        .unwrap();
    let r = sink.last_status(Pump1).unwrap();
    assert!(!r.running);
    assert_eq!(r.last_reason, StatusReason::Stopped);
    assert!(!relays.is_on(Pump1));
    assert_eq!(relays.activations(Pump1), 1);
}

#[test]
fn refresh_cannot_extend_past_ceiling() {
    let (mut app, mut relays, mut sink) = make_app();
    app.handle_command(start(Pump1, Some(200_000)), 0, &mut relays, &mut sink)
        .unwrap();
    app.handle_command(start(Pump1, Some(200_000)), 150_000, &mut relays, &mut sink)
        .unwrap();

    let r = sink.last_status(Pump1).unwrap();
    assert_eq!(r.last_reason, StatusReason::Refreshed);
    assert_eq!(r.remaining_ms, 150_000);
    assert_eq!(relays.activations(Pump1), 1);

    app.tick(299_999, None, &mut relays, &mut sink);
    assert!(relays.is_on(Pump1));
    app.tick(300_000, None, &mut relays, &mut sink);
    assert!(!relays.is_on(Pump1));
    assert_eq!(
        sink.last_status(Pump1).unwrap().last_reason,
        StatusReason::SafetyLimitTripped
    );
}

#[test]
fn refresh_within_ceiling_replaces_remaining_time() {
    let (mut app, mut relays, mut sink) = make_app();
    app.handle_command(start(Pump1, Some(60_000)), 0, &mut relays, &mut sink)
        .unwrap();
    app.handle_command(start(Pump1, Some(10_000)), 20_000, &mut relays, &mut sink)
        .unwrap();

    app.tick(29_999, None, &mut relays, &mut sink);
    assert!(relays.is_on(Pump1));
    app.tick(30_000, None, &mut relays, &mut sink);
    assert!(!relays.is_on(Pump1));
    assert_eq!(sink.last_status(Pump1).unwrap().last_reason, StatusReason::Completed);
}

#[test]
fn channels_are_independent() {
    let (mut app, mut relays, mut sink) = make_app();
    app.handle_command(start(Pump1, Some(5_000)), 0, &mut relays, &mut sink)
        .unwrap();
    app.handle_command(start(Pump2, Some(9_000)), 0, &mut relays, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::Stop { channel: Pump2 }, 1_000, &mut relays, &mut sink)
        .unwrap();

    assert!(relays.is_on(Pump1));
    assert!(!relays.is_on(Pump2));
    app.tick(5_000, None, &mut relays, &mut sink);
    assert!(!relays.is_on(Pump1));
    assert_eq!(sink.last_status(Pump2).unwrap().last_reason, StatusReason::Stopped);
}

#[test]
fn heartbeat_on_first_tick_then_each_interval() {
    let (mut app, mut relays, mut sink) = make_app();
    let beats = |sink: &RecordingSink| {
        sink.events
            .iter()
            .filter(|e| matches!(e, AppEvent::Heartbeat(_)))
            .count()
    };

    app.tick(0, None, &mut relays, &mut sink);
    assert_eq!(beats(&sink), 1);
    app.tick(59_999, None, &mut relays, &mut sink);
    assert_eq!(beats(&sink), 1);
    app.tick(60_000, None, &mut relays, &mut sink);
    assert_eq!(beats(&sink), 2);
    assert_eq!(app.tick_count(), 3);

    let Some(AppEvent::Heartbeat(status)) = sink.events.last() else {
        panic!("expected heartbeat");
    };
    assert!(!status.time_synced);
    assert!(!status.transport_connected);
}

#[test]
fn reconnect_refreshes_both_statuses_once() {
    let (mut app, _relays, mut sink) = make_app();
    sink.clear();

    app.set_transport_available(true, 0, &mut sink);
    app.set_transport_available(true, 10, &mut sink);
    assert_eq!(sink.events[0], AppEvent::TransportChanged(true));
    assert_eq!(sink.statuses(Pump1).len(), 1);
    assert_eq!(sink.statuses(Pump2).len(), 1);

    app.set_transport_available(false, 20, &mut sink);
    assert_eq!(sink.events.last(), Some(&AppEvent::TransportChanged(false)));
    assert!(!app.transport_available());
}

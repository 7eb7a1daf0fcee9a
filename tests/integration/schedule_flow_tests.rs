//! Schedule topic → ScheduleEngine → scheduled runs, plus persistence.

use crate::mock_hw::{MockClock, MockNvs, MockRelays, RecordingSink};

use irrigation::adapters::schedule_store::ScheduleStore;
use irrigation::app::commands::AppCommand;
use irrigation::app::events::AppEvent;
use irrigation::app::ports::{ClockPort, RelayPort};
use irrigation::app::service::AppService;
use irrigation::config::SystemConfig;
use irrigation::control::channel::PumpChannel::{Pump1, Pump2};
use irrigation::control::pump::{CommandSource, StatusReason};
use irrigation::error::ControlError;
use irrigation::mqtt::inbound::InboundMessage;
use irrigation::mqtt::router::CommandRouter;

type Sink = (RecordingSink, ScheduleStore<MockNvs>);

fn make() -> (AppService, MockRelays, Sink) {
    let mut sink = (RecordingSink::new(), ScheduleStore::new(MockNvs::new()));
    let mut relays = MockRelays::new();
    let mut app = AppService::new(SystemConfig::default());
    app.start(&mut relays, &mut sink);
    (app, relays, sink)
}

fn send_schedule(
    app: &mut AppService,
    relays: &mut MockRelays,
    sink: &mut Sink,
    topic: &str,
    body: &str,
) -> Result<(), ControlError> {
    CommandRouter::dispatch(&InboundMessage::new(topic, body.as_bytes()), app, 0, relays, sink)
}

/// Run the loop every 250 ms for `ms`.
fn run_for(
    app: &mut AppService,
    relays: &mut MockRelays,
    sink: &mut Sink,
    clock: &mut MockClock,
    ms: u64,
) {
    let end = clock.now_ms + ms;
    while clock.now_ms < end {
        clock.advance(250);
        app.tick(clock.uptime_ms(), clock.local_time(), relays, sink);
    }
}

#[test]
fn scheduled_run_fires_once_and_completes() {
    let (mut app, mut relays, mut sink) = make();
    send_schedule(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump1/schedule",
        r#"[{"timeOfDay":"06:00","durationMs":20000}]"#,
    )
    .unwrap();

    let mut clock = MockClock::at(20_000, 5, 59, 0);
    run_for(&mut app, &mut relays, &mut sink, &mut clock, 59_000);
    assert!(!relays.is_on(Pump1));

    // 06:00:00 .. 06:00:15
    run_for(&mut app, &mut relays, &mut sink, &mut clock, 16_000);
    assert!(relays.is_on(Pump1));
    let r = sink.0.last_status(Pump1).unwrap();
    assert_eq!(r.source, Some(CommandSource::Scheduled));

    run_for(&mut app, &mut relays, &mut sink, &mut clock, 60_000);
    assert!(!relays.is_on(Pump1));
    assert_eq!(relays.activations(Pump1), 1);
    assert!(sink.0.saw_reason(Pump1, StatusReason::Completed));
}

#[test]
fn unsynced_clock_never_fires() {
    let (mut app, mut relays, mut sink) = make();
    send_schedule(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump1/schedule",
        r#"{"hour":0,"minute":0,"durationMs":1000}"#,
    )
    .unwrap();

    let mut clock = MockClock::unsynced();
    run_for(&mut app, &mut relays, &mut sink, &mut clock, 180_000);
    assert_eq!(relays.activations(Pump1), 0);
}

#[test]
fn days_mask_limits_firing() {
    // Day 20_000 is a Friday, 20_001 a Saturday.
    for (day, expected) in [(20_000, 0), (20_001, 1)] {
        let (mut app, mut relays, mut sink) = make();
        send_schedule(
            &mut app,
            &mut relays,
            &mut sink,
            "plant/pump2/schedule",
            r#"{"timeOfDay":{"hour":7,"minute":30},"durationMs":5000,"daysMask":["sat","sun"]}"#,
        )
        .unwrap();

        let mut clock = MockClock::at(day, 7, 29, 30);
        run_for(&mut app, &mut relays, &mut sink, &mut clock, 120_000);
        assert_eq!(relays.activations(Pump2), expected, "day {day}");
    }
}

#[test]
fn accepted_schedule_is_persisted_and_restored() {
    let (mut app, mut relays, mut sink) = make();
    send_schedule(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump2/schedule",
        r#"[{"id":4,"timeOfDay":"06:00","durationMs":20000},
            {"id":9,"timeOfDay":"18:30","durationMs":999999,"intervalDays":2}]"#,
    )
    .unwrap();

    let saved = sink.1.load(Pump2).unwrap().unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[1].id, 9);
    // Clamped to the ceiling on the way in.
    assert_eq!(saved[1].duration_ms, 300_000);
    assert_eq!(sink.1.load(Pump1), Ok(None));

    let mut rebooted = AppService::new(SystemConfig::default());
    rebooted.load_schedule(Pump2, &saved).unwrap();
    assert_eq!(rebooted.schedules().entries(Pump2), app.schedules().entries(Pump2));
}

#[test]
fn interval_days_hold_across_reboot() {
    let (mut app, mut relays, mut sink) = make();
    send_schedule(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump1/schedule",
        r#"{"timeOfDay":"06:00","durationMs":5000,"intervalDays":3}"#,
    )
    .unwrap();
    // Polls land at 05:59:30 and 06:00:30.
    let mut clock = MockClock::at(20_010, 5, 59, 30);
    run_for(&mut app, &mut relays, &mut sink, &mut clock, 90_000);
    assert_eq!(relays.activations(Pump1), 1);

    // Reboot: restore table and fired marks from storage.
    let (_, store) = sink;
    let mut rebooted = AppService::new(SystemConfig::default());
    rebooted
        .load_schedule(Pump1, &store.load(Pump1).unwrap().unwrap())
        .unwrap();
    rebooted.restore_fired(Pump1, &store.load_fired(Pump1).unwrap().unwrap());
    let mut sink = (RecordingSink::new(), store);
    let mut relays = MockRelays::new();
    rebooted.start(&mut relays, &mut sink);

    // The dashboard resends the same rule; the interval still holds.
    send_schedule(
        &mut rebooted,
        &mut relays,
        &mut sink,
        "plant/pump1/schedule",
        r#"{"timeOfDay":"06:00","durationMs":5000,"intervalDays":3}"#,
    )
    .unwrap();

    // Three whole days, polled every minute.
    let mut clock = MockClock::at(20_011, 0, 0, 0);
    let mut per_day = Vec::new();
    for _ in 0..3 {
        for _ in 0..86_400 / 30 {
            clock.advance(30_000);
            rebooted.tick(clock.uptime_ms(), clock.local_time(), &mut relays, &mut sink);
        }
        per_day.push(relays.activations(Pump1));
    }
    assert_eq!(per_day, [0, 0, 1]);
}

#[test]
fn rejected_schedule_is_not_persisted() {
    let (mut app, mut relays, mut sink) = make();
    send_schedule(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump1/schedule",
        r#"{"timeOfDay":"06:00","durationMs":1000}"#,
    )
    .unwrap();
    let writes = sink.1.storage().writes;

    let err = send_schedule(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump1/schedule",
        r#"[{"timeOfDay":"25:00","durationMs":1000}]"#,
    )
    .unwrap_err();
    assert!(matches!(err, ControlError::InvalidSchedule(_)));
    assert_eq!(sink.1.storage().writes, writes);
    assert_eq!(app.schedules().len(Pump1), 1);
}

#[test]
fn clear_and_toggle_commands_update_store() {
    let (mut app, mut relays, mut sink) = make();
    send_schedule(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump1/schedule",
        r#"[{"id":1,"timeOfDay":"06:00","durationMs":1000},{"id":2,"timeOfDay":"07:00","durationMs":1000}]"#,
    )
    .unwrap();

    app.handle_command(
        AppCommand::SetScheduleEnabled {
            channel: Pump1,
            entry_id: 2,
            enabled: false,
        },
        0,
        &mut relays,
        &mut sink,
    )
    .unwrap();
    let saved = sink.1.load(Pump1).unwrap().unwrap();
    assert!(saved[0].enabled);
    assert!(!saved[1].enabled);

    assert!(matches!(
        app.handle_command(
            AppCommand::SetScheduleEnabled {
                channel: Pump1,
                entry_id: 7,
                enabled: false,
            },
            0,
            &mut relays,
            &mut sink,
        ),
        Err(ControlError::InvalidSchedule(_))
    ));

    app.handle_command(AppCommand::ClearSchedule { channel: Pump1 }, 0, &mut relays, &mut sink)
        .unwrap();
    assert_eq!(sink.1.load(Pump1), Ok(None));
    assert!(
        sink.0
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::ScheduleChanged { channel, entries } if *channel == Pump1 && entries.is_empty()))
    );
}

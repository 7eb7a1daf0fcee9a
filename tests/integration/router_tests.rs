//! Inbound MQTT message → CommandRouter → AppService → status publish.

use crate::mock_hw::{MockRelays, RecordingSink};

use irrigation::adapters::mqtt::{MqttAdapter, MqttSettings};
use irrigation::app::events::AppEvent;
use irrigation::app::ports::RelayPort;
use irrigation::app::service::AppService;
use irrigation::config::SystemConfig;
use irrigation::control::channel::PumpChannel::{Pump1, Pump2};
use irrigation::control::pump::StatusReason;
use irrigation::error::ControlError;
use irrigation::mqtt::inbound::{self, InboundMessage, InboundQueue, PAYLOAD_CAP};
use irrigation::mqtt::publisher::StatusPublisher;
use irrigation::mqtt::router::CommandRouter;

type Sink = (RecordingSink, StatusPublisher<MqttAdapter>);

fn make() -> (AppService, MockRelays, Sink) {
    let mut transport = MqttAdapter::connect(&MqttSettings {
        url: "mqtt://localhost:1883",
        client_id: "irrigation-test",
        username: "",
        password: "",
        keep_alive_secs: 30,
    })
    .unwrap();
    transport.set_connected(true);
    let mut sink = (RecordingSink::new(), StatusPublisher::new(transport));
    let mut relays = MockRelays::new();
    let mut app = AppService::new(SystemConfig::default());
    app.start(&mut relays, &mut sink);
    (app, relays, sink)
}

fn deliver(
    app: &mut AppService,
    relays: &mut MockRelays,
    sink: &mut Sink,
    topic: &str,
    payload: &[u8],
    now_ms: u64,
) -> Result<(), ControlError> {
    CommandRouter::dispatch(&InboundMessage::new(topic, payload), app, now_ms, relays, sink)
}

fn published_on<'a>(sink: &'a Sink, topic: &str) -> Vec<&'a [u8]> {
    sink.1
        .transport()
        .published
        .iter()
        .filter(|(t, _, _)| t == topic)
        .map(|(_, body, _)| body.as_slice())
        .collect()
}

#[test]
fn json_start_runs_and_publishes_retained_status() {
    let (mut app, mut relays, mut sink) = make();

    deliver(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump2/set",
        br#"{"action":"start","durationMs":20000}"#,
        1_000,
    )
    .unwrap();
    assert!(relays.is_on(Pump2));
    assert!(!relays.is_on(Pump1));

    let bodies = published_on(&sink, "plant/pump2/status");
    assert_eq!(bodies.len(), 1);
    let json: serde_json::Value = serde_json::from_slice(bodies[0]).unwrap();
    assert_eq!(json["channel"], "pump2");
    assert_eq!(json["running"], true);
    assert_eq!(json["remainingMs"], 20_000);
    assert_eq!(json["lastReason"], "started");
    assert_eq!(json["source"], "manual");
    assert!(sink.1.transport().published.iter().all(|(_, _, retain)| *retain));
}

#[test]
fn plain_text_off_stops() {
    let (mut app, mut relays, mut sink) = make();
    deliver(&mut app, &mut relays, &mut sink, "plant/pump1/set", b"ON", 0).unwrap();
    assert!(relays.is_on(Pump1));
    deliver(&mut app, &mut relays, &mut sink, "plant/pump1/set", b"off", 500).unwrap();
    assert!(!relays.is_on(Pump1));
    assert_eq!(sink.0.last_status(Pump1).unwrap().last_reason, StatusReason::Stopped);
}

#[test]
fn malformed_set_is_reported_on_its_channel() {
    let (mut app, mut relays, mut sink) = make();

    let err = deliver(&mut app, &mut relays, &mut sink, "plant/pump1/set", b"{not json", 0)
        .unwrap_err();
    assert!(matches!(err, ControlError::MalformedPayload(_)));
    assert_eq!(relays.activations(Pump1), 0);

    let r = sink.0.last_status(Pump1).unwrap();
    assert_eq!(r.last_reason, StatusReason::Rejected);
    assert_eq!(r.last_error, Some(err));

    let bodies = published_on(&sink, "plant/pump1/status");
    let json: serde_json::Value = serde_json::from_slice(bodies.last().unwrap()).unwrap();
    assert_eq!(json["lastError"], "malformed_payload");
}

#[test]
fn negative_duration_over_mqtt_is_rejected() {
    let (mut app, mut relays, mut sink) = make();
    assert_eq!(
        deliver(
            &mut app,
            &mut relays,
            &mut sink,
            "plant/pump1/set",
            br#"{"state":"on","duration":-1}"#,
            0,
        ),
        Err(ControlError::InvalidDuration)
    );
    assert!(!relays.is_on(Pump1));
}

#[test]
fn unknown_topic_touches_no_pump() {
    let (mut app, mut relays, mut sink) = make();
    sink.0.clear();

    let err = deliver(&mut app, &mut relays, &mut sink, "plant/pump3/set", b"on", 0).unwrap_err();
    assert!(matches!(err, ControlError::MalformedPayload(_)));
    assert_eq!(
        sink.0.events,
        vec![AppEvent::CommandRejected {
            channel: None,
            error: err,
        }]
    );
}

#[test]
fn oversized_message_rejected_before_decoding() {
    let (mut app, mut relays, mut sink) = make();
    let big = vec![b' '; PAYLOAD_CAP + 1];

    let err = deliver(&mut app, &mut relays, &mut sink, "plant/pump2/schedule", &big, 0)
        .unwrap_err();
    assert_eq!(err, ControlError::MalformedPayload("message too large"));
    assert_eq!(sink.0.last_status(Pump2).unwrap().last_error, Some(err));
}

#[test]
fn offline_publisher_drops_and_counts_nothing() {
    let (mut app, mut relays, mut sink) = make();
    sink.1.transport_mut().set_connected(false);
    let before = sink.1.counters();

    deliver(&mut app, &mut relays, &mut sink, "plant/pump1/set", b"start", 0).unwrap();
    assert!(relays.is_on(Pump1));
    assert_eq!(sink.1.counters(), before);
}

#[test]
fn queued_messages_drain_in_order() {
    static QUEUE: InboundQueue = InboundQueue::new();
    let (mut app, mut relays, mut sink) = make();

    assert!(inbound::offer(&QUEUE, "plant/pump1/set", b"on"));
    assert!(inbound::offer(&QUEUE, "plant/pump1/set", b"off"));
    assert!(inbound::offer(&QUEUE, "plant/pump2/set", b"on"));

    while let Some(msg) = inbound::next(&QUEUE) {
        let _ = CommandRouter::dispatch(&msg, &mut app, 0, &mut relays, &mut sink);
    }
    assert!(!relays.is_on(Pump1));
    assert!(relays.is_on(Pump2));
    assert_eq!(
        relays.calls[2..],
        [(Pump1, true), (Pump1, false), (Pump2, true)]
    );
}

#[test]
fn transition_also_updates_system_topic() {
    let (mut app, mut relays, mut sink) = make();
    let before = published_on(&sink, "plant/status").len();

    deliver(&mut app, &mut relays, &mut sink, "plant/pump1/set", b"on", 0).unwrap();
    let summaries = published_on(&sink, "plant/status");
    assert_eq!(summaries.len(), before + 1);
    let json: serde_json::Value = serde_json::from_slice(summaries.last().unwrap()).unwrap();
    assert_eq!(json["pumps"][0]["running"], true);
    assert_eq!(json["pumps"][1]["running"], false);

    deliver(&mut app, &mut relays, &mut sink, "plant/pump1/set", b"off", 10).unwrap();
    let summaries = published_on(&sink, "plant/status");
    assert_eq!(summaries.len(), before + 2);
    let json: serde_json::Value = serde_json::from_slice(summaries.last().unwrap()).unwrap();
    assert_eq!(json["pumps"][0]["lastReason"], "stopped");
}

#[test]
fn schedule_with_mixed_ids_is_accepted() {
    let (mut app, mut relays, mut sink) = make();
    deliver(
        &mut app,
        &mut relays,
        &mut sink,
        "plant/pump1/schedule",
        br#"[{"id":1,"timeOfDay":"06:00","durationMs":20000},{"timeOfDay":"07:00","durationMs":10000}]"#,
        0,
    )
    .unwrap();

    let table = app.schedules().entries(Pump1);
    assert_eq!(table.len(), 2);
    assert_ne!(table[0].id, table[1].id);
    assert_eq!((table[1].hour, table[1].id), (7, 0));
}

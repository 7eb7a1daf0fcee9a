//! Fuzz target: `plant/pump{N}/set` decoding and dispatch
//!
//! Drives arbitrary bytes through the router into a live service and
//! asserts that nothing panics and that a rejected message never
//! energises a relay.
//!
//! cargo fuzz run fuzz_set_payload

#![no_main]

use libfuzzer_sys::fuzz_target;

use irrigation::app::events::AppEvent;
use irrigation::app::ports::{EventSink, RelayPort};
use irrigation::app::service::AppService;
use irrigation::config::SystemConfig;
use irrigation::control::channel::PumpChannel;
use irrigation::mqtt::inbound::InboundMessage;
use irrigation::mqtt::router::CommandRouter;

#[derive(Default)]
struct Relays([bool; 2]);

impl RelayPort for Relays {
    fn set(&mut self, channel: PumpChannel, on: bool) {
        self.0[channel.index()] = on;
    }

    fn is_on(&self, channel: PumpChannel) -> bool {
        self.0[channel.index()]
    }
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let mut app = AppService::new(SystemConfig::default());
    let mut relays = Relays::default();
    let msg = InboundMessage::new("plant/pump1/set", data);

    let result = CommandRouter::dispatch(&msg, &mut app, 0, &mut relays, &mut Discard);
    if result.is_err() {
        assert!(!relays.is_on(PumpChannel::Pump1), "rejected set energised a relay");
    }
    assert_eq!(relays.is_on(PumpChannel::Pump1), app.pumps().is_running(PumpChannel::Pump1));
    assert!(!relays.is_on(PumpChannel::Pump2));

    // Whatever was accepted, the ceiling still holds.
    let remaining = app.pumps().state(PumpChannel::Pump1).remaining_ms(0);
    assert!(remaining <= app.config().max_pump_duration_ms);
});

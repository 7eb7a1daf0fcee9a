//! Fuzz target: `codec::decode_schedule`
//!
//! Arbitrary bytes must either decode into a table the engine accepts
//! unchanged, or be rejected without panicking.
//!
//! cargo fuzz run fuzz_schedule_payload

#![no_main]

use libfuzzer_sys::fuzz_target;

use irrigation::control::channel::PumpChannel;
use irrigation::mqtt::codec;
use irrigation::scheduler::{MAX_ENTRIES_PER_CHANNEL, ScheduleEngine};

const MAX: u32 = 300_000;

fuzz_target!(|data: &[u8]| {
    let Ok(entries) = codec::decode_schedule(data, MAX) else {
        return;
    };
    assert!(entries.len() <= MAX_ENTRIES_PER_CHANNEL);
    for e in &entries {
        assert!((1..=MAX).contains(&e.duration_ms), "duration escaped clamp");
        assert!(e.hour < 24 && e.minute < 60);
    }

    // Duplicate ids are the only decoded shape the engine may still refuse.
    let mut engine = ScheduleEngine::new(MAX);
    if engine.replace_all(PumpChannel::Pump1, &entries).is_ok() {
        assert_eq!(engine.entries(PumpChannel::Pump1), entries);
    }
});

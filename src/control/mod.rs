//! Pump control: channel identity and the per-pump state machine.

pub mod channel;
pub mod pump;

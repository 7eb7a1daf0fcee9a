//! Relay bank adapter.
//!
//! Implements [`RelayPort`] over one `embedded-hal` output pin per pump.
//! This is the only place that knows relay polarity: with
//! `active_low = true` (the common opto-isolated modules) a pump is ON
//! when its pin is LOW.

use embedded_hal::digital::{OutputPin, PinState};
use log::{debug, error};

use crate::app::ports::RelayPort;
use crate::control::channel::PumpChannel;

pub struct RelayBank<P: OutputPin> {
    pins: [P; PumpChannel::COUNT],
    active_low: bool,
    on: [bool; PumpChannel::COUNT],
}

impl<P: OutputPin> RelayBank<P> {
    /// Take ownership of the pins and force every relay off.
    pub fn new(pins: [P; PumpChannel::COUNT], active_low: bool) -> Self {
        let mut bank = Self {
            pins,
            active_low,
            on: [false; PumpChannel::COUNT],
        };
        bank.all_off();
        bank
    }

    /// Pin level that produces the logical state `on`.
    pub const fn level_for(active_low: bool, on: bool) -> PinState {
        if on != active_low {
            PinState::High
        } else {
            PinState::Low
        }
    }
}

impl<P: OutputPin> RelayPort for RelayBank<P> {
    fn set(&mut self, channel: PumpChannel, on: bool) {
        let level = Self::level_for(self.active_low, on);
        match self.pins[channel.index()].set_state(level) {
            Ok(()) => {
                self.on[channel.index()] = on;
                debug!("Relay {channel}: {} ({level:?})", if on { "ON" } else { "OFF" });
            }
            Err(_) => error!("Relay {channel}: pin write failed"),
        }
    }

    fn is_on(&self, channel: PumpChannel) -> bool {
        self.on[channel.index()]
    }
}

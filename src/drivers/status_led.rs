//! Single-colour status LED.
//!
//! Solid while the broker link is up, 1 Hz blink otherwise.  Works on any
//! `embedded-hal` output pin.

use embedded_hal::digital::OutputPin;

/// Half period of the "disconnected" blink (ms).
const BLINK_HALF_PERIOD_MS: u64 = 500;

pub struct StatusLed<P: OutputPin> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P) -> Self {
        let mut led = Self { pin, lit: true };
        led.set(false);
        led
    }

    /// Refresh the LED from the current link state.  Call once per loop.
    pub fn update(&mut self, connected: bool, now_ms: u64) {
        let lit = connected || (now_ms / BLINK_HALF_PERIOD_MS) % 2 == 0;
        self.set(lit);
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    fn set(&mut self, lit: bool) {
        if lit == self.lit {
            return;
        }
        let ok = if lit {
            self.pin.set_high().is_ok()
        } else {
            self.pin.set_low().is_ok()
        };
        if ok {
            self.lit = lit;
        } else {
            log::warn!("StatusLed: pin write failed");
        }
    }
}

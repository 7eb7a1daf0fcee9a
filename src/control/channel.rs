//! Pump channel identity.

use core::fmt;
use serde::{Deserialize, Serialize};

/// One of the two independently controlled pump outputs.
///
/// Fixed at configuration time and bound 1:1 to a relay pin
/// (`SystemConfig::relay_pins[channel.index()]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PumpChannel {
    Pump1 = 0,
    Pump2 = 1,
}

impl PumpChannel {
    /// Sizes every per-channel array.
    pub const COUNT: usize = 2;

    /// Every channel, in index order.
    pub const ALL: [Self; Self::COUNT] = [Self::Pump1, Self::Pump2];

    /// Zero-based array index.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// One-based number as used in topic names (`plant/pump1/...`).
    pub const fn number(self) -> u8 {
        self as u8 + 1
    }

    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Pump1),
            2 => Some(Self::Pump2),
            _ => None,
        }
    }
}

impl fmt::Display for PumpChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pump{}", self.number())
    }
}

//! Topic names and inbound topic parsing.
//!
//! | Topic                    | Dir | Retained |
//! |--------------------------|-----|----------|
//! | `plant/pump{N}/set`      | in  | -        |
//! | `plant/pump{N}/schedule` | in  | -        |
//! | `plant/pump{N}/status`   | out | yes      |
//! | `plant/status`           | out | yes      |

use crate::control::channel::PumpChannel;

/// Shared system topic: heartbeat, `online` on connect, `offline` last will.
pub const SYSTEM_STATUS: &str = "plant/status";

/// Payload published on [`SYSTEM_STATUS`] after every (re)connect.
pub const ONLINE: &str = "online";

/// Last-will payload on [`SYSTEM_STATUS`].
pub const OFFLINE: &str = "offline";

/// Everything the firmware listens on; re-issued after each reconnect.
pub const SUBSCRIPTIONS: [&str; 4] = [
    "plant/pump1/set",
    "plant/pump2/set",
    "plant/pump1/schedule",
    "plant/pump2/schedule",
];

const PUMP_STATUS: [&str; PumpChannel::COUNT] = ["plant/pump1/status", "plant/pump2/status"];

/// Per-pump retained status topic.
pub const fn pump_status(channel: PumpChannel) -> &'static str {
    PUMP_STATUS[channel.index()]
}

/// What an inbound message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundTopic {
    Set(PumpChannel),
    Schedule(PumpChannel),
}

impl InboundTopic {
    pub const fn channel(self) -> PumpChannel {
        match self {
            Self::Set(ch) | Self::Schedule(ch) => ch,
        }
    }

    /// Parse `plant/pump{N}/{set|schedule}`.  Anything else is `None`.
    pub fn parse(topic: &str) -> Option<Self> {
        let rest = topic.strip_prefix("plant/pump")?;
        let (num, leaf) = rest.split_once('/')?;
        if num.len() != 1 {
            return None;
        }
        let channel = PumpChannel::from_number(num.parse().ok()?)?;
        match leaf {
            "set" => Some(Self::Set(channel)),
            "schedule" => Some(Self::Schedule(channel)),
            _ => None,
        }
    }
}

/// Best-effort channel attribution for a topic the router could not parse
/// (so the error can still land on the right status topic).
pub fn channel_hint(topic: &str) -> Option<PumpChannel> {
    let rest = topic.strip_prefix("plant/pump")?;
    let num = rest.split('/').next()?;
    PumpChannel::from_number(num.parse().ok()?)
}

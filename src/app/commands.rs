//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (MQTT set and
//! schedule topics) after the [`CommandRouter`](crate::mqtt::router::CommandRouter)
//! has decoded them.  The [`AppService`](super::service::AppService)
//! interprets and acts upon them.

use crate::control::channel::PumpChannel;
use crate::scheduler::{EntryList, ScheduleEntry};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Manual start.  `None` means "use the configured default duration";
    /// the value is signed so a negative request can be reported.
    Start {
        channel: PumpChannel,
        duration_ms: Option<i64>,
    },

    /// Immediate stop.
    Stop { channel: PumpChannel },

    /// Replace the channel's whole schedule, all or nothing.
    ReplaceSchedule {
        channel: PumpChannel,
        entries: EntryList,
    },

    /// Insert or replace one entry by id.
    UpsertScheduleEntry {
        channel: PumpChannel,
        entry: ScheduleEntry,
    },

    /// Toggle one entry without touching the rest.
    SetScheduleEnabled {
        channel: PumpChannel,
        entry_id: u8,
        enabled: bool,
    },

    /// Drop every entry of the channel.
    ClearSchedule { channel: PumpChannel },
}

impl AppCommand {
    pub const fn channel(&self) -> PumpChannel {
        match self {
            Self::Start { channel, .. }
            | Self::Stop { channel }
            | Self::ReplaceSchedule { channel, .. }
            | Self::UpsertScheduleEntry { channel, .. }
            | Self::SetScheduleEnabled { channel, .. }
            | Self::ClearSchedule { channel } => *channel,
        }
    }
}

//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, publish over MQTT,
//! persist schedules to NVS.

use crate::control::channel::PumpChannel;
pub use crate::control::pump::StatusReport;
use crate::error::ControlError;
use crate::scheduler::{EntryList, FiredMarks};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The application service has started.
    Started,

    /// A pump transitioned, or a command against it was refused.
    PumpStatus(StatusReport),

    /// Periodic system snapshot.
    Heartbeat(SystemStatus),

    /// Snapshot following one or more pump transitions.
    StatusSummary(SystemStatus),

    /// An inbound command was refused.  `channel` is `None` when the
    /// topic itself could not be attributed to a pump.
    CommandRejected {
        channel: Option<PumpChannel>,
        error: ControlError,
    },

    /// A channel's schedule table changed (carries the new table).
    ScheduleChanged {
        channel: PumpChannel,
        entries: EntryList,
    },

    /// A schedule entry fired; carries the channel's fired marks.
    ScheduleFired {
        channel: PumpChannel,
        marks: FiredMarks,
    },

    /// Broker link went up (`true`) or down (`false`).
    TransportChanged(bool),
}

/// A point-in-time system snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatus {
    pub uptime_ms: u64,
    pub transport_connected: bool,
    pub time_synced: bool,
    pub pumps: [StatusReport; PumpChannel::COUNT],
    pub schedule_counts: [u8; PumpChannel::COUNT],
}

impl SystemStatus {
    /// Link state as a status flag for the summary body.
    pub const fn link_error(&self) -> Option<ControlError> {
        if self.transport_connected {
            None
        } else {
            Some(ControlError::TransportUnavailable)
        }
    }
}

//! Per-pump state machine.
//!
//! ```text
//!            start(d)                 deadline reached
//!   Idle ─────────────────▶ Running ──────────────────▶ Idle
//!    ▲                       │   ▲                (Completed /
//!    │        stop()         │   │ manual start    SafetyLimitTripped)
//!    └───────────────────────┘   └─ (Refreshed)
//! ```
//!
//! ## Safety contract
//!
//! A pump never stays energised longer than `max_duration_ms` measured from
//! the moment it went `Idle → Running`.  A manual refresh replaces the
//! remaining time but can never push the deadline past that ceiling; if it
//! tried to, the eventual stop reports [`StatusReason::SafetyLimitTripped`].
//!
//! The controller is a pure state machine: it drives relays through the
//! [`RelayPort`] it is handed and never reads a clock itself.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::RelayPort;
use crate::control::channel::PumpChannel;
use crate::error::ControlError;

/// Who asked for the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSource {
    Manual,
    Scheduled,
}

impl CommandSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

/// Why the channel is in its current state.  Carried in every status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    /// Never run since boot.
    Idle,
    Started,
    /// A manual start replaced the remaining time of a running pump.
    Refreshed,
    /// Stopped on request.
    Stopped,
    /// The requested duration elapsed.
    Completed,
    /// The hard ceiling cut the run short.
    SafetyLimitTripped,
    /// A scheduled start was ignored because the pump was already running.
    Suppressed,
    /// The last command was invalid.
    Rejected,
}

impl StatusReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Refreshed => "refreshed",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::SafetyLimitTripped => "safety_limit_tripped",
            Self::Suppressed => "suppressed",
            Self::Rejected => "rejected",
        }
    }
}

/// Result of a successful [`PumpController::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The pump was idle and is now running.
    Started,
    /// The pump was already running; its timer was replaced.
    Refreshed,
}

/// Runtime state of one pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpState {
    pub running: bool,
    /// Uptime (ms) of the `Idle → Running` transition.  `Some` iff running.
    pub started_at_ms: Option<u64>,
    /// Duration of the most recent accepted request, after clamping.
    pub requested_duration_ms: u32,
    pub source: Option<CommandSource>,
    /// Uptime (ms) at which the run ends.  Meaningless while idle.
    deadline_ms: u64,
    /// The last refresh was truncated by the ceiling.
    capped: bool,
    pub last_reason: StatusReason,
    pub last_error: Option<ControlError>,
}

impl PumpState {
    const IDLE: Self = Self {
        running: false,
        started_at_ms: None,
        requested_duration_ms: 0,
        source: None,
        deadline_ms: 0,
        capped: false,
        last_reason: StatusReason::Idle,
        last_error: None,
    };

    /// Milliseconds left in the current run (0 when idle).
    pub fn remaining_ms(&self, now_ms: u64) -> u32 {
        if !self.running {
            return 0;
        }
        u32::try_from(self.deadline_ms.saturating_sub(now_ms)).unwrap_or(u32::MAX)
    }
}

/// Snapshot of one channel, as published on its status topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub channel: PumpChannel,
    pub running: bool,
    pub remaining_ms: u32,
    pub last_reason: StatusReason,
    pub last_error: Option<ControlError>,
    pub source: Option<CommandSource>,
}

/// Stops produced by one [`PumpController::tick`].
pub type Expired = heapless::Vec<(PumpChannel, StatusReason), { PumpChannel::COUNT }>;

/// Owns every channel's [`PumpState`].  The only writer of pump state.
pub struct PumpController {
    channels: [PumpState; PumpChannel::COUNT],
    max_duration_ms: u32,
}

impl PumpController {
    pub fn new(max_duration_ms: u32) -> Self {
        Self {
            channels: [PumpState::IDLE; PumpChannel::COUNT],
            max_duration_ms: max_duration_ms.max(1),
        }
    }

    pub fn max_duration_ms(&self) -> u32 {
        self.max_duration_ms
    }

    pub fn state(&self, channel: PumpChannel) -> &PumpState {
        &self.channels[channel.index()]
    }

    pub fn is_running(&self, channel: PumpChannel) -> bool {
        self.channels[channel.index()].running
    }

    /// Start (or refresh) a pump.
    ///
    /// `duration_ms ≤ 0` is rejected without touching the run.  Longer than
    /// the ceiling is clamped.  A scheduled request against a running pump
    /// is suppressed; a manual one replaces the remaining time.
    pub fn start(
        &mut self,
        channel: PumpChannel,
        duration_ms: i64,
        source: CommandSource,
        now_ms: u64,
        relays: &mut impl RelayPort,
    ) -> Result<StartOutcome, ControlError> {
        let max = self.max_duration_ms;
        let st = &mut self.channels[channel.index()];

        if duration_ms <= 0 {
            warn!("{channel}: rejected start, duration {duration_ms} ms");
            st.last_reason = StatusReason::Rejected;
            st.last_error = Some(ControlError::InvalidDuration);
            return Err(ControlError::InvalidDuration);
        }
        // Lossless: clamped to a u32 ceiling first.
        let duration = duration_ms.min(i64::from(max)) as u32;

        match (st.running, st.started_at_ms) {
            (true, Some(started_at)) => {
                if source == CommandSource::Scheduled {
                    info!("{channel}: scheduled start suppressed (already running)");
                    st.last_reason = StatusReason::Suppressed;
                    st.last_error = Some(ControlError::Suppressed);
                    return Err(ControlError::Suppressed);
                }

                let wanted = now_ms + u64::from(duration);
                let ceiling = started_at + u64::from(max);
                st.deadline_ms = wanted.min(ceiling);
                st.capped = wanted > ceiling;
                st.requested_duration_ms = duration;
                st.source = Some(source);
                st.last_reason = StatusReason::Refreshed;
                st.last_error = None;
                relays.set(channel, true);

                if st.capped {
                    warn!(
                        "{channel}: refresh capped, {} ms left of {max} ms ceiling",
                        st.deadline_ms - now_ms
                    );
                } else {
                    info!("{channel}: refreshed, {duration} ms");
                }
                Ok(StartOutcome::Refreshed)
            }
            _ => {
                *st = PumpState {
                    running: true,
                    started_at_ms: Some(now_ms),
                    requested_duration_ms: duration,
                    source: Some(source),
                    deadline_ms: now_ms + u64::from(duration),
                    capped: false,
                    last_reason: StatusReason::Started,
                    last_error: None,
                };
                relays.set(channel, true);
                info!("{channel}: started ({}), {duration} ms", source.as_str());
                Ok(StartOutcome::Started)
            }
        }
    }

    /// Stop immediately.  Returns `true` if the pump was running.
    ///
    /// Stopping an idle channel re-asserts the relay off and changes nothing
    /// else, so repeated stops are harmless.
    pub fn stop(&mut self, channel: PumpChannel, relays: &mut impl RelayPort) -> bool {
        relays.set(channel, false);
        let st = &mut self.channels[channel.index()];
        if !st.running {
            return false;
        }
        Self::go_idle(st, StatusReason::Stopped);
        info!("{channel}: stopped");
        true
    }

    /// Countdown check.  Call at least once per second.
    ///
    /// Returns every channel that was switched off by this call, with the
    /// reason it stopped.
    pub fn tick(&mut self, now_ms: u64, relays: &mut impl RelayPort) -> Expired {
        let mut expired = Expired::new();
        for ch in PumpChannel::ALL {
            let st = &mut self.channels[ch.index()];
            if !st.running || now_ms < st.deadline_ms {
                continue;
            }
            let reason = if st.capped {
                StatusReason::SafetyLimitTripped
            } else {
                StatusReason::Completed
            };
            relays.set(ch, false);
            Self::go_idle(st, reason);
            info!("{ch}: {}", reason.as_str());
            // Capacity equals the channel count.
            let _ = expired.push((ch, reason));
        }
        expired
    }

    /// Note a refused command against `channel` so the next report carries it.
    /// The run itself is untouched.
    pub fn record_rejection(&mut self, channel: PumpChannel, error: ControlError) {
        let st = &mut self.channels[channel.index()];
        st.last_reason = StatusReason::Rejected;
        st.last_error = Some(error);
    }

    /// Build the outbound status for one channel.
    pub fn report(&self, channel: PumpChannel, now_ms: u64) -> StatusReport {
        let st = &self.channels[channel.index()];
        StatusReport {
            channel,
            running: st.running,
            remaining_ms: st.remaining_ms(now_ms),
            last_reason: st.last_reason,
            last_error: st.last_error,
            source: st.source,
        }
    }

    fn go_idle(st: &mut PumpState, reason: StatusReason) {
        st.running = false;
        st.started_at_ms = None;
        st.capped = false;
        st.last_reason = reason;
        st.last_error = None;
    }
}

//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the pump controller, the schedule engine, and the
//! run-loop timers.  It exposes a clean, hardware-agnostic API.  All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!  AppCommand ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │        AppService         │
//!   RelayPort ◀── │  PumpController · Sched   │
//!                 └──────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::SystemConfig;
use crate::control::channel::PumpChannel;
use crate::control::pump::{CommandSource, PumpController};
use crate::error::ControlError;
use crate::scheduler::{FiredMark, LocalTime, ScheduleEngine, ScheduleEntry};

use super::commands::AppCommand;
use super::events::{AppEvent, SystemStatus};
use super::ports::{EventSink, RelayPort, ScheduleFire, SchedulerDelegate};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    pumps: PumpController,
    schedules: ScheduleEngine,
    /// Uptime of the next schedule poll; `None` until the first tick.
    next_poll_ms: Option<u64>,
    next_heartbeat_ms: u64,
    transport_up: bool,
    time_synced: bool,
    tick_count: u64,
}

impl AppService {
    /// Construct the service from configuration.  All pumps start idle.
    pub fn new(config: SystemConfig) -> Self {
        let max = config.max_pump_duration_ms;
        Self {
            pumps: PumpController::new(max),
            schedules: ScheduleEngine::new(max),
            config,
            next_poll_ms: None,
            next_heartbeat_ms: 0,
            transport_up: false,
            time_synced: false,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Force every relay off and announce the service.
    pub fn start(&mut self, relays: &mut impl RelayPort, sink: &mut impl EventSink) {
        relays.all_off();
        sink.emit(&AppEvent::Started);
        info!(
            "AppService started (default {} ms, max {} ms)",
            self.config.default_pump_duration_ms, self.config.max_pump_duration_ms
        );
    }

    /// Restore a persisted schedule at boot.  Emits nothing.
    pub fn load_schedule(
        &mut self,
        channel: PumpChannel,
        entries: &[ScheduleEntry],
    ) -> Result<(), ControlError> {
        self.schedules.replace_all(channel, entries)
    }

    /// Restore persisted fired marks after [`load_schedule`](Self::load_schedule).
    pub fn restore_fired(&mut self, channel: PumpChannel, marks: &[FiredMark]) {
        self.schedules.restore_fired(channel, marks);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one loop iteration: countdown → schedule poll → heartbeat.
    ///
    /// `local` is the current wall-clock time, or `None` before the first
    /// SNTP sync (schedules are skipped, countdowns still run).
    pub fn tick(
        &mut self,
        now_ms: u64,
        local: Option<LocalTime>,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        self.time_synced = local.is_some();

        // 1. Countdown / safety ceiling
        let expired = self.pumps.tick(now_ms, relays);
        let stopped: heapless::Vec<PumpChannel, { PumpChannel::COUNT }> =
            expired.iter().map(|&(ch, _)| ch).collect();
        self.announce(&stopped, now_ms, sink);

        // 2. Schedule poll
        if self.poll_due(now_ms) {
            match local {
                Some(t) => self.run_schedules(&t, now_ms, relays, sink),
                None => warn!("Schedule poll skipped: clock not synced"),
            }
        }

        // 3. Heartbeat
        if now_ms >= self.next_heartbeat_ms {
            self.next_heartbeat_ms = now_ms + u64::from(self.config.heartbeat_interval_ms);
            sink.emit(&AppEvent::Heartbeat(self.status(now_ms)));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a decoded inbound command.
    ///
    /// On failure the channel's status carries the error and a
    /// [`AppEvent::CommandRejected`] is emitted; no other state changes.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<(), ControlError> {
        let channel = cmd.channel();
        let result = match cmd {
            AppCommand::Start {
                channel,
                duration_ms,
            } => {
                let d = duration_ms.unwrap_or(i64::from(self.config.default_pump_duration_ms));
                self.pumps
                    .start(channel, d, CommandSource::Manual, now_ms, relays)
                    .map(|_| ())
            }
            AppCommand::Stop { channel } => {
                self.pumps.stop(channel, relays);
                Ok(())
            }
            AppCommand::ReplaceSchedule { channel, entries } => self
                .schedules
                .replace_all(channel, &entries)
                .map(|()| self.schedule_changed(channel, sink)),
            AppCommand::UpsertScheduleEntry { channel, entry } => self
                .schedules
                .add_or_replace(channel, entry)
                .map(|()| self.schedule_changed(channel, sink)),
            AppCommand::SetScheduleEnabled {
                channel,
                entry_id,
                enabled,
            } => self
                .schedules
                .set_enabled(channel, entry_id, enabled)
                .map(|()| self.schedule_changed(channel, sink)),
            AppCommand::ClearSchedule { channel } => {
                self.schedules.remove_all(channel);
                self.schedule_changed(channel, sink);
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                self.announce(&[channel], now_ms, sink);
                Ok(())
            }
            Err(e) => {
                self.reject(Some(channel), e, now_ms, sink);
                Err(e)
            }
        }
    }

    /// Report a refused command.  Used directly by the router for payloads
    /// that never decoded into an [`AppCommand`].
    pub fn reject(
        &mut self,
        channel: Option<PumpChannel>,
        error: ControlError,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) {
        warn!(
            "Command rejected on {}: {error}",
            channel.map_or("?".into(), |c| c.to_string())
        );
        sink.emit(&AppEvent::CommandRejected { channel, error });
        if let Some(ch) = channel {
            self.pumps.record_rejection(ch, error);
            self.announce(&[ch], now_ms, sink);
        }
    }

    /// Track the broker link.  On reconnect the retained pump statuses are
    /// refreshed.
    pub fn set_transport_available(&mut self, up: bool, now_ms: u64, sink: &mut impl EventSink) {
        if up == self.transport_up {
            return;
        }
        self.transport_up = up;
        sink.emit(&AppEvent::TransportChanged(up));
        if up {
            self.announce(&PumpChannel::ALL, now_ms, sink);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a system snapshot.
    pub fn status(&self, now_ms: u64) -> SystemStatus {
        SystemStatus {
            uptime_ms: now_ms,
            transport_connected: self.transport_up,
            time_synced: self.time_synced,
            pumps: PumpChannel::ALL.map(|ch| self.pumps.report(ch, now_ms)),
            schedule_counts: PumpChannel::ALL.map(|ch| self.schedules.len(ch) as u8),
        }
    }

    pub fn pumps(&self) -> &PumpController {
        &self.pumps
    }

    pub fn schedules(&self) -> &ScheduleEngine {
        &self.schedules
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn transport_available(&self) -> bool {
        self.transport_up
    }

    /// Total loop ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    /// Fixed-grid poll timer: the first tick polls, later polls stay on a
    /// multiple of the interval so loop jitter does not accumulate.
    fn poll_due(&mut self, now_ms: u64) -> bool {
        let interval = u64::from(self.config.schedule_check_interval_ms);
        match self.next_poll_ms {
            Some(next) if now_ms < next => false,
            Some(next) => {
                let following = next + interval;
                self.next_poll_ms = Some(if following > now_ms {
                    following
                } else {
                    now_ms + interval
                });
                true
            }
            None => {
                self.next_poll_ms = Some(now_ms + interval);
                true
            }
        }
    }

    fn run_schedules(
        &mut self,
        now: &LocalTime,
        now_ms: u64,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) {
        let mut starter = ScheduledStarts {
            pumps: &mut self.pumps,
            relays,
            now_ms,
            touched: heapless::Vec::new(),
        };
        self.schedules.evaluate(now, &mut starter);
        let touched = starter.touched;
        for &channel in &touched {
            sink.emit(&AppEvent::ScheduleFired {
                channel,
                marks: self.schedules.fired_marks(channel),
            });
        }
        self.announce(&touched, now_ms, sink);
    }

    /// Emit the status of each channel in `channels`, then one summary.
    fn announce(&self, channels: &[PumpChannel], now_ms: u64, sink: &mut impl EventSink) {
        if channels.is_empty() {
            return;
        }
        for &ch in channels {
            sink.emit(&AppEvent::PumpStatus(self.pumps.report(ch, now_ms)));
        }
        sink.emit(&AppEvent::StatusSummary(self.status(now_ms)));
    }

    fn schedule_changed(&self, channel: PumpChannel, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::ScheduleChanged {
            channel,
            entries: self.schedules.entries(channel),
        });
    }
}

/// Delegate that turns schedule firings into `scheduled` pump starts.
struct ScheduledStarts<'a, R: RelayPort> {
    pumps: &'a mut PumpController,
    relays: &'a mut R,
    now_ms: u64,
    touched: heapless::Vec<PumpChannel, { PumpChannel::COUNT }>,
}

impl<R: RelayPort> SchedulerDelegate for ScheduledStarts<'_, R> {
    fn on_schedule_fired(&mut self, fire: ScheduleFire) {
        // Suppression is recorded in the pump's status; nothing else to do.
        let _ = self.pumps.start(
            fire.channel,
            i64::from(fire.duration_ms),
            CommandSource::Scheduled,
            self.now_ms,
            &mut *self.relays,
        );
        // At most one firing per channel per evaluation.
        let _ = self.touched.push(fire.channel);
    }
}

//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => {
                info!("START | relays off, awaiting commands");
            }
            AppEvent::PumpStatus(r) => {
                info!(
                    "PUMP  | {} running={} remaining={}ms reason={} source={} error={}",
                    r.channel,
                    r.running,
                    r.remaining_ms,
                    r.last_reason.as_str(),
                    r.source.map_or("-", |s| s.as_str()),
                    r.last_error.map_or("-", |e| e.code()),
                );
            }
            AppEvent::Heartbeat(s) => {
                info!(
                    "BEAT  | uptime={}s broker={} time={} pump1={} pump2={} schedules={}/{}",
                    s.uptime_ms / 1_000,
                    if s.transport_connected { "UP" } else { "DOWN" },
                    if s.time_synced { "OK" } else { "UNSET" },
                    if s.pumps[0].running { "ON" } else { "off" },
                    if s.pumps[1].running { "ON" } else { "off" },
                    s.schedule_counts[0],
                    s.schedule_counts[1],
                );
            }
            AppEvent::StatusSummary(s) => {
                debug!(
                    "SUM   | pump1={} pump2={} link={}",
                    if s.pumps[0].running { "ON" } else { "off" },
                    if s.pumps[1].running { "ON" } else { "off" },
                    s.link_error().map_or("ok", |e| e.code()),
                );
            }
            AppEvent::ScheduleFired { channel, marks } => {
                info!("FIRE  | {channel} ({} entries with a fired day)", marks.len());
            }
            AppEvent::CommandRejected { channel, error } => match channel {
                Some(ch) => warn!("REJECT| {ch}: {error}"),
                None => warn!("REJECT| {error}"),
            },
            AppEvent::ScheduleChanged { channel, entries } => {
                info!("SCHED | {channel} now has {} entries", entries.len());
            }
            AppEvent::TransportChanged(up) => {
                info!("LINK  | broker {}", if *up { "connected" } else { "disconnected" });
            }
        }
    }
}

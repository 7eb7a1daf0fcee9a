//! JSON payload codec for the MQTT topics.
//!
//! ## Inbound
//!
//! `plant/pump{N}/set` accepts, in order of preference:
//!
//! ```text
//! {"action":"start","durationMs":20000}     {"action":"stop"}
//! {"state":"on","duration":20000}           {"state":"off"}
//! on | off | start | stop                   (plain text, any case)
//! ```
//!
//! `plant/pump{N}/schedule` accepts a list of entry descriptors or a single
//! descriptor object; either form replaces the channel's whole schedule.
//!
//! ```text
//! [{"timeOfDay":"06:00","durationMs":20000,"enabled":true,"daysMask":127}]
//! {"hour":6,"minute":0,"durationMs":20000,"enabled":true,"intervalDays":2}
//! {"timeOfDay":{"hour":6,"minute":0},"durationMs":1000,"daysMask":["sat","sun"]}
//! ```
//!
//! Anything that is not well-formed JSON of one of these shapes is
//! `MalformedPayload`; well-formed descriptors with out-of-range values are
//! `InvalidSchedule`.
//!
//! ## Outbound
//!
//! Status and heartbeat bodies are camelCase JSON objects.

use serde::{Deserialize, Serialize};

use crate::app::events::{StatusReport, SystemStatus};
use crate::error::ControlError;
use crate::scheduler::{EntryList, MAX_ENTRIES_PER_CHANNEL, ScheduleEntry};

// ═══════════════════════════════════════════════════════════════
//  Set topic
// ═══════════════════════════════════════════════════════════════

/// Decoded `set` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetRequest {
    /// `None` means "use the configured default duration".
    Start { duration_ms: Option<i64> },
    Stop,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetPayload {
    action: Option<String>,
    state: Option<String>,
    duration_ms: Option<i64>,
    duration: Option<i64>,
}

fn verb(word: &str, duration_ms: Option<i64>) -> Result<SetRequest, ControlError> {
    if word.eq_ignore_ascii_case("start") || word.eq_ignore_ascii_case("on") {
        Ok(SetRequest::Start { duration_ms })
    } else if word.eq_ignore_ascii_case("stop") || word.eq_ignore_ascii_case("off") {
        Ok(SetRequest::Stop)
    } else {
        Err(ControlError::MalformedPayload("unknown action"))
    }
}

/// Decode a `plant/pump{N}/set` payload.
pub fn decode_set(payload: &[u8]) -> Result<SetRequest, ControlError> {
    let text = core::str::from_utf8(payload)
        .map_err(|_| ControlError::MalformedPayload("not UTF-8"))?
        .trim();

    if text.is_empty() {
        return Err(ControlError::MalformedPayload("empty payload"));
    }
    if !text.starts_with('{') {
        // Plain word, optionally JSON-quoted.
        let word = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text);
        return verb(word, None);
    }

    let p: SetPayload =
        serde_json::from_str(text).map_err(|_| ControlError::MalformedPayload("invalid JSON"))?;
    let word = p
        .action
        .as_deref()
        .or(p.state.as_deref())
        .ok_or(ControlError::MalformedPayload("missing action"))?;
    verb(word, p.duration_ms.or(p.duration))
}

// ═══════════════════════════════════════════════════════════════
//  Schedule topic
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(untagged)]
enum SchedulePayload {
    Many(Vec<EntryDescriptor>),
    One(EntryDescriptor),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryDescriptor {
    id: Option<u8>,
    time_of_day: Option<TimeOfDay>,
    hour: Option<i64>,
    minute: Option<i64>,
    duration_ms: i64,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    days_mask: Option<DaysMask>,
    interval_days: Option<i64>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimeOfDay {
    Text(String),
    Parts { hour: i64, minute: i64 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DaysMask {
    Bits(i64),
    Names(Vec<String>),
}

const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

fn parse_hh_mm(text: &str) -> Result<(i64, i64), ControlError> {
    const BAD: ControlError = ControlError::InvalidSchedule("time must be HH:MM");
    let (h, m) = text.trim().split_once(':').ok_or(BAD)?;
    Ok((h.parse().map_err(|_| BAD)?, m.parse().map_err(|_| BAD)?))
}

fn day_bit(name: &str) -> Result<u8, ControlError> {
    let name = name.trim().to_ascii_lowercase();
    DAY_NAMES
        .iter()
        .position(|d| name.starts_with(d))
        .map(|i| 1 << i)
        .ok_or(ControlError::InvalidSchedule("unknown day name"))
}

impl EntryDescriptor {
    fn into_entry(self, id: u8, max_duration_ms: u32) -> Result<ScheduleEntry, ControlError> {
        let (hour, minute) = match self.time_of_day {
            Some(TimeOfDay::Text(t)) => parse_hh_mm(&t)?,
            Some(TimeOfDay::Parts { hour, minute }) => (hour, minute),
            None => match (self.hour, self.minute) {
                (Some(h), Some(m)) => (h, m),
                _ => return Err(ControlError::InvalidSchedule("missing time of day")),
            },
        };
        if !(0..=23).contains(&hour) {
            return Err(ControlError::InvalidSchedule("hour out of range"));
        }
        if !(0..=59).contains(&minute) {
            return Err(ControlError::InvalidSchedule("minute out of range"));
        }
        if self.duration_ms <= 0 {
            return Err(ControlError::InvalidSchedule("duration must be positive"));
        }
        let duration_ms = self.duration_ms.min(i64::from(max_duration_ms)) as u32;

        let days_mask = match self.days_mask {
            None => ScheduleEntry::EVERY_DAY,
            Some(DaysMask::Bits(b)) if (0..=0x7F).contains(&b) => b as u8,
            Some(DaysMask::Bits(_)) => {
                return Err(ControlError::InvalidSchedule("days mask out of range"));
            }
            Some(DaysMask::Names(names)) => names
                .iter()
                .try_fold(0u8, |mask, n| day_bit(n).map(|bit| mask | bit))?,
        };

        let interval_days = match self.interval_days {
            None => 1,
            Some(n) if (1..=255).contains(&n) => n as u8,
            Some(_) => return Err(ControlError::InvalidSchedule("interval out of range")),
        };

        Ok(ScheduleEntry {
            id,
            hour: hour as u8,
            minute: minute as u8,
            duration_ms,
            enabled: self.enabled,
            days_mask,
            interval_days,
        })
    }
}

/// Decode a `plant/pump{N}/schedule` payload into the channel's new table.
///
/// Durations above `max_duration_ms` are clamped; durations ≤ 0 reject the
/// whole batch.  Entries without an `id` take the lowest ids no explicit
/// `id` in the batch uses, in list order.
pub fn decode_schedule(payload: &[u8], max_duration_ms: u32) -> Result<EntryList, ControlError> {
    let parsed: SchedulePayload = serde_json::from_slice(payload)
        .map_err(|_| ControlError::MalformedPayload("invalid schedule JSON"))?;
    let descriptors = match parsed {
        SchedulePayload::Many(v) => v,
        SchedulePayload::One(d) => vec![d],
    };
    if descriptors.len() > MAX_ENTRIES_PER_CHANNEL {
        return Err(ControlError::InvalidSchedule("too many entries"));
    }

    let explicit: heapless::Vec<u8, MAX_ENTRIES_PER_CHANNEL> =
        descriptors.iter().filter_map(|d| d.id).collect();
    let mut free_ids = (0..=u8::MAX).filter(|id| !explicit.contains(id));

    let mut entries = EntryList::new();
    for d in descriptors {
        let id = match d.id {
            Some(id) => id,
            // At most 8 explicit ids, so a free one always exists.
            None => free_ids
                .next()
                .ok_or(ControlError::InvalidSchedule("no free entry id"))?,
        };
        let entry = d.into_entry(id, max_duration_ms)?;
        // Length checked above.
        let _ = entries.push(entry);
    }
    Ok(entries)
}

// ═══════════════════════════════════════════════════════════════
//  Outbound
// ═══════════════════════════════════════════════════════════════

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    channel: String,
    running: bool,
    remaining_ms: u32,
    last_reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'static str>,
}

impl From<&StatusReport> for StatusBody {
    fn from(r: &StatusReport) -> Self {
        Self {
            channel: r.channel.to_string(),
            running: r.running,
            remaining_ms: r.remaining_ms,
            last_reason: r.last_reason.as_str(),
            last_error: r.last_error.map(ControlError::code),
            source: r.source.map(|s| s.as_str()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatBody {
    uptime_ms: u64,
    connected: bool,
    time_synced: bool,
    pumps: Vec<StatusBody>,
    schedules: [u8; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    link_error: Option<&'static str>,
}

/// Body for `plant/pump{N}/status`.
pub fn encode_status(report: &StatusReport) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&StatusBody::from(report))
}

/// Body for `plant/status`: heartbeat and post-transition summary.
pub fn encode_heartbeat(status: &SystemStatus) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&HeartbeatBody {
        uptime_ms: status.uptime_ms,
        connected: status.transport_connected,
        time_synced: status.time_synced,
        pumps: status.pumps.iter().map(StatusBody::from).collect(),
        schedules: status.schedule_counts,
        link_error: status.link_error().map(ControlError::code),
    })
}

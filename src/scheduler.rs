//! Time-of-day schedule engine.
//!
//! Each pump owns a small table of [`ScheduleEntry`]s.  The run loop polls
//! [`ScheduleEngine::evaluate`] with the current local time; when an entry
//! matches the minute, the engine notifies a [`SchedulerDelegate`] rather
//! than touching the pumps itself.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ClockPort::local_time()                                     │
//! │          │                                                   │
//! │          ▼                                                   │
//! │  ScheduleEngine::evaluate()                                  │
//! │     per channel: enabled ∧ day ∧ HH:MM ∧ interval            │
//! │     tie-break: longest duration                              │
//! │          │                                                   │
//! │          ▼                                                   │
//! │  SchedulerDelegate::on_schedule_fired()                      │
//! │          │                                                   │
//! │          ▼                                                   │
//! │  PumpController::start(.., Scheduled)                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Matching is edge-triggered on the minute: a minute the poll never saw is
//! lost, and a minute already evaluated is never evaluated again.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{ScheduleFire, SchedulerDelegate};
use crate::control::channel::PumpChannel;
use crate::error::ControlError;

/// Maximum entries per channel (stack-allocated).
pub const MAX_ENTRIES_PER_CHANNEL: usize = 8;

/// Fixed-capacity list of one channel's entries.
pub type EntryList = heapless::Vec<ScheduleEntry, MAX_ENTRIES_PER_CHANNEL>;

/// The local day an entry last fired.  Persisted so `interval_days`
/// survives a reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredMark {
    pub entry_id: u8,
    pub day: u32,
}

/// One channel's fired marks.
pub type FiredMarks = heapless::Vec<FiredMark, MAX_ENTRIES_PER_CHANNEL>;

const SECS_PER_DAY: i64 = 86_400;

// ═══════════════════════════════════════════════════════════════
//  Local time
// ═══════════════════════════════════════════════════════════════

/// Broken-down local wall-clock time, UTC offset already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// Local days since 1970-01-01.
    pub day: u32,
    /// 0 = Sunday … 6 = Saturday.
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl LocalTime {
    /// Build from a local day number and time of day.
    pub const fn new(day: u32, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            day,
            // 1970-01-01 was a Thursday.
            weekday: ((day % 7 + 4) % 7) as u8,
            hour,
            minute,
            second,
        }
    }

    /// Convert a UNIX timestamp (UTC seconds) to local time.
    /// Returns `None` for instants before the epoch once offset.
    pub fn from_unix(utc_secs: i64, utc_offset_secs: i32) -> Option<Self> {
        let local = utc_secs.checked_add(i64::from(utc_offset_secs))?;
        if local < 0 {
            return None;
        }
        let day = u32::try_from(local / SECS_PER_DAY).ok()?;
        let sod = local % SECS_PER_DAY;
        Some(Self::new(
            day,
            (sod / 3600) as u8,
            ((sod % 3600) / 60) as u8,
            (sod % 60) as u8,
        ))
    }

    /// Minutes since the epoch; identifies the minute being evaluated.
    pub const fn minute_stamp(&self) -> u64 {
        self.day as u64 * 1440 + self.hour as u64 * 60 + self.minute as u64
    }
}

// ═══════════════════════════════════════════════════════════════
//  Schedule entries
// ═══════════════════════════════════════════════════════════════

/// One "run pump at HH:MM for N ms" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Identifier, unique within its channel.
    pub id: u8,
    pub hour: u8,
    pub minute: u8,
    pub duration_ms: u32,
    pub enabled: bool,
    /// Bit 0 = Sunday … bit 6 = Saturday.  Zero means every day.
    pub days_mask: u8,
    /// 1 = every matching day; N = at most once every N days.
    pub interval_days: u8,
}

impl ScheduleEntry {
    pub const EVERY_DAY: u8 = 0;

    /// Check the entry against the engine limits.
    pub fn validate(&self, max_duration_ms: u32) -> Result<(), ControlError> {
        if self.hour > 23 {
            return Err(ControlError::InvalidSchedule("hour out of range"));
        }
        if self.minute > 59 {
            return Err(ControlError::InvalidSchedule("minute out of range"));
        }
        if self.duration_ms == 0 || self.duration_ms > max_duration_ms {
            return Err(ControlError::InvalidSchedule("duration out of range"));
        }
        if self.days_mask & 0x80 != 0 {
            return Err(ControlError::InvalidSchedule("days mask out of range"));
        }
        if self.interval_days == 0 {
            return Err(ControlError::InvalidSchedule("interval must be at least 1 day"));
        }
        Ok(())
    }

    fn runs_on(&self, weekday: u8) -> bool {
        self.days_mask == Self::EVERY_DAY || self.days_mask & (1 << weekday) != 0
    }
}

/// Internal bookkeeping for a live entry.
#[derive(Debug, Clone, Copy)]
struct Slot {
    entry: ScheduleEntry,
    /// Local day this entry last fired (drives `interval_days`).
    last_fired_day: Option<u32>,
}

impl Slot {
    const fn new(entry: ScheduleEntry) -> Self {
        Self {
            entry,
            last_fired_day: None,
        }
    }

    /// New slot for `entry`; the fired mark is kept only if the rule itself
    /// is unchanged.
    fn replaced_by(&self, entry: ScheduleEntry) -> Self {
        Self {
            entry,
            last_fired_day: self.last_fired_day.filter(|_| self.entry == entry),
        }
    }

    fn is_due(&self, now: &LocalTime) -> bool {
        let e = &self.entry;
        if !e.enabled || e.hour != now.hour || e.minute != now.minute || !e.runs_on(now.weekday) {
            return false;
        }
        match self.last_fired_day {
            Some(last) => now.day.saturating_sub(last) >= u32::from(e.interval_days),
            None => true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Engine
// ═══════════════════════════════════════════════════════════════

/// Per-channel schedule tables plus the minute-edge detector.
pub struct ScheduleEngine {
    tables: [heapless::Vec<Slot, MAX_ENTRIES_PER_CHANNEL>; PumpChannel::COUNT],
    max_duration_ms: u32,
    last_minute: Option<u64>,
}

impl ScheduleEngine {
    pub fn new(max_duration_ms: u32) -> Self {
        Self {
            tables: [heapless::Vec::new(), heapless::Vec::new()],
            max_duration_ms,
            last_minute: None,
        }
    }

    /// Insert an entry, replacing any entry with the same id.
    /// An invalid entry leaves the table untouched.
    pub fn add_or_replace(
        &mut self,
        channel: PumpChannel,
        entry: ScheduleEntry,
    ) -> Result<(), ControlError> {
        entry.validate(self.max_duration_ms)?;
        let table = &mut self.tables[channel.index()];
        if let Some(slot) = table.iter_mut().find(|s| s.entry.id == entry.id) {
            *slot = slot.replaced_by(entry);
        } else {
            table
                .push(Slot::new(entry))
                .map_err(|_| ControlError::InvalidSchedule("too many entries"))?;
        }
        info!(
            "Scheduler: {channel} entry {} at {:02}:{:02} for {} ms",
            entry.id, entry.hour, entry.minute, entry.duration_ms
        );
        Ok(())
    }

    /// Swap the whole table for `entries`, all or nothing.
    pub fn replace_all(
        &mut self,
        channel: PumpChannel,
        entries: &[ScheduleEntry],
    ) -> Result<(), ControlError> {
        let old = &self.tables[channel.index()];
        let mut table = heapless::Vec::<Slot, MAX_ENTRIES_PER_CHANNEL>::new();
        for (i, entry) in entries.iter().enumerate() {
            if let Err(e) = entry.validate(self.max_duration_ms) {
                warn!("Scheduler: {channel} batch rejected at entry {i}: {e}");
                return Err(e);
            }
            if entries[..i].iter().any(|prev| prev.id == entry.id) {
                return Err(ControlError::InvalidSchedule("duplicate entry id"));
            }
            let slot = old
                .iter()
                .find(|s| s.entry.id == entry.id)
                .map_or(Slot::new(*entry), |s| s.replaced_by(*entry));
            table
                .push(slot)
                .map_err(|_| ControlError::InvalidSchedule("too many entries"))?;
        }
        self.tables[channel.index()] = table;
        info!("Scheduler: {channel} schedule replaced ({} entries)", entries.len());
        Ok(())
    }

    pub fn remove_all(&mut self, channel: PumpChannel) {
        self.tables[channel.index()].clear();
        info!("Scheduler: {channel} schedule cleared");
    }

    pub fn set_enabled(
        &mut self,
        channel: PumpChannel,
        entry_id: u8,
        enabled: bool,
    ) -> Result<(), ControlError> {
        let slot = self.tables[channel.index()]
            .iter_mut()
            .find(|s| s.entry.id == entry_id)
            .ok_or(ControlError::InvalidSchedule("unknown entry id"))?;
        slot.entry.enabled = enabled;
        Ok(())
    }

    /// Copy of one channel's entries, in insertion order.
    pub fn entries(&self, channel: PumpChannel) -> EntryList {
        self.tables[channel.index()].iter().map(|s| s.entry).collect()
    }

    /// Entries of `channel` that have fired, with the day they last did.
    pub fn fired_marks(&self, channel: PumpChannel) -> FiredMarks {
        self.tables[channel.index()]
            .iter()
            .filter_map(|s| {
                s.last_fired_day.map(|day| FiredMark {
                    entry_id: s.entry.id,
                    day,
                })
            })
            .collect()
    }

    /// Re-apply persisted fired marks.  Marks for unknown ids are ignored.
    pub fn restore_fired(&mut self, channel: PumpChannel, marks: &[FiredMark]) {
        for mark in marks {
            if let Some(slot) = self.tables[channel.index()]
                .iter_mut()
                .find(|s| s.entry.id == mark.entry_id)
            {
                slot.last_fired_day = Some(mark.day);
            }
        }
    }

    pub fn len(&self, channel: PumpChannel) -> usize {
        self.tables[channel.index()].len()
    }

    pub fn is_empty(&self, channel: PumpChannel) -> bool {
        self.tables[channel.index()].is_empty()
    }

    /// Evaluate every channel against `now`.
    ///
    /// For each channel, the longest due entry fires (first one wins on a
    /// tie).  Returns the number of firings.  A repeated call within the
    /// same minute does nothing.
    pub fn evaluate(&mut self, now: &LocalTime, delegate: &mut dyn SchedulerDelegate) -> usize {
        let stamp = now.minute_stamp();
        if self.last_minute == Some(stamp) {
            return 0;
        }
        self.last_minute = Some(stamp);

        let mut fired = 0;
        for ch in PumpChannel::ALL {
            let table = &mut self.tables[ch.index()];
            let mut best: Option<usize> = None;
            for (i, slot) in table.iter().enumerate() {
                if !slot.is_due(now) {
                    continue;
                }
                if best.is_none_or(|b| slot.entry.duration_ms > table[b].entry.duration_ms) {
                    best = Some(i);
                }
            }
            let Some(i) = best else { continue };

            let slot = &mut table[i];
            slot.last_fired_day = Some(now.day);
            info!(
                "Scheduler: {ch} entry {} fired at {:02}:{:02} ({} ms)",
                slot.entry.id, now.hour, now.minute, slot.entry.duration_ms
            );
            delegate.on_schedule_fired(ScheduleFire {
                channel: ch,
                entry_id: slot.entry.id,
                duration_ms: slot.entry.duration_ms,
            });
            fired += 1;
        }
        fired
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

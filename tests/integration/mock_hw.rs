//! Mock adapters for integration tests.
//!
//! Records every relay call and emitted event so tests can assert on the
//! full history without touching real GPIO or a broker.

use irrigation::app::events::AppEvent;
use irrigation::app::ports::{ClockPort, EventSink, RelayPort, StorageError, StoragePort};
use irrigation::control::channel::PumpChannel;
use irrigation::control::pump::{StatusReason, StatusReport};
use irrigation::scheduler::LocalTime;
use std::collections::HashMap;

// ── MockRelays ────────────────────────────────────────────────

pub struct MockRelays {
    on: [bool; PumpChannel::COUNT],
    pub calls: Vec<(PumpChannel, bool)>,
}

#[allow(dead_code)]
impl MockRelays {
    pub fn new() -> Self {
        Self {
            on: [false; PumpChannel::COUNT],
            calls: Vec::new(),
        }
    }

    /// Number of off→on transitions seen on `channel`.
    pub fn activations(&self, channel: PumpChannel) -> usize {
        let mut on = false;
        let mut n = 0;
        for &(ch, level) in &self.calls {
            if ch != channel {
                continue;
            }
            if level && !on {
                n += 1;
            }
            on = level;
        }
        n
    }
}

impl Default for MockRelays {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayPort for MockRelays {
    fn set(&mut self, channel: PumpChannel, on: bool) {
        self.on[channel.index()] = on;
        self.calls.push((channel, on));
    }

    fn is_on(&self, channel: PumpChannel) -> bool {
        self.on[channel.index()]
    }
}

// ── MockClock ─────────────────────────────────────────────────

/// Uptime starts at zero; wall clock starts at `base` once synced.
pub struct MockClock {
    pub now_ms: u64,
    base_secs: Option<u32>,
    day: u32,
}

#[allow(dead_code)]
impl MockClock {
    /// Unsynced clock (no wall time).
    pub fn unsynced() -> Self {
        Self {
            now_ms: 0,
            base_secs: None,
            day: 0,
        }
    }

    /// Wall clock reads `hh:mm:ss` on `day` at uptime zero.
    pub fn at(day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            now_ms: 0,
            base_secs: Some(hour * 3600 + minute * 60 + second),
            day,
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }
}

impl ClockPort for MockClock {
    fn uptime_ms(&self) -> u64 {
        self.now_ms
    }

    fn local_time(&self) -> Option<LocalTime> {
        let secs = u64::from(self.base_secs?) + self.now_ms / 1_000;
        let day = self.day + (secs / 86_400) as u32;
        let sod = secs % 86_400;
        Some(LocalTime::new(
            day,
            (sod / 3600) as u8,
            ((sod % 3600) / 60) as u8,
            (sod % 60) as u8,
        ))
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Every pump status emitted for `channel`, oldest first.
    pub fn statuses(&self, channel: PumpChannel) -> Vec<StatusReport> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::PumpStatus(r) if r.channel == channel => Some(*r),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self, channel: PumpChannel) -> Option<StatusReport> {
        self.statuses(channel).pop()
    }

    pub fn saw_reason(&self, channel: PumpChannel, reason: StatusReason) -> bool {
        self.statuses(channel).iter().any(|r| r.last_reason == reason)
    }

    pub fn rejections(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::CommandRejected { .. }))
            .count()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockNvs ───────────────────────────────────────────────────

pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub writes: usize,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
            writes: 0,
        }
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.get(&k) {
            Some(v) if v.len() <= buf.len() => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            Some(_) => Err(StorageError::IoError),
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes += 1;
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }
}

//! Schedule persistence.
//!
//! Each channel's table is stored as one `postcard` blob under
//! `irrigation::sched{N}`, and the day each entry last fired under
//! `irrigation::fired{N}`.  The store listens for
//! [`AppEvent::ScheduleChanged`] and [`AppEvent::ScheduleFired`] and
//! rewrites the affected blob, so the core never calls storage directly.  At boot, [`ScheduleStore::load`]
//! restores what was saved; a blob that fails to decode is logged and
//! ignored (the channel starts with an empty schedule).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, StorageError, StoragePort};
use crate::control::channel::PumpChannel;
use crate::scheduler::{EntryList, FiredMark, FiredMarks, ScheduleEntry};

const NAMESPACE: &str = "irrigation";

const KEYS: [&str; PumpChannel::COUNT] = ["sched1", "sched2"];

const FIRED_KEYS: [&str; PumpChannel::COUNT] = ["fired1", "fired2"];

/// Upper bound for one encoded table (8 entries, varint-packed).
const BLOB_CAP: usize = 256;

pub struct ScheduleStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> ScheduleStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load the saved table for `channel`.  `Ok(None)` if nothing is stored.
    pub fn load(&self, channel: PumpChannel) -> Result<Option<EntryList>, StorageError> {
        let mut buf = [0u8; BLOB_CAP];
        let len = match self.storage.read(NAMESPACE, KEYS[channel.index()], &mut buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let entries: EntryList = postcard::from_bytes(&buf[..len]).map_err(|_| {
            warn!("ScheduleStore: {channel} blob corrupted ({len} bytes), ignoring");
            StorageError::Corrupted
        })?;
        info!("ScheduleStore: {channel} loaded {} entries", entries.len());
        Ok(Some(entries))
    }

    /// Load the fired marks for `channel`.  `Ok(None)` if nothing is stored.
    pub fn load_fired(&self, channel: PumpChannel) -> Result<Option<FiredMarks>, StorageError> {
        let mut buf = [0u8; BLOB_CAP];
        let len = match self.storage.read(NAMESPACE, FIRED_KEYS[channel.index()], &mut buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let marks: FiredMarks = postcard::from_bytes(&buf[..len]).map_err(|_| {
            warn!("ScheduleStore: {channel} fired marks corrupted, ignoring");
            StorageError::Corrupted
        })?;
        Ok(Some(marks))
    }

    pub fn save_fired(&mut self, channel: PumpChannel, marks: &[FiredMark]) -> Result<(), StorageError> {
        let blob = postcard::to_allocvec(marks).map_err(|_| StorageError::IoError)?;
        self.storage.write(NAMESPACE, FIRED_KEYS[channel.index()], &blob)
    }

    /// Persist `entries` as the table for `channel`.  An empty table
    /// deletes the key along with its fired marks.
    pub fn save(&mut self, channel: PumpChannel, entries: &[ScheduleEntry]) -> Result<(), StorageError> {
        let key = KEYS[channel.index()];
        if entries.is_empty() {
            self.storage.delete(NAMESPACE, FIRED_KEYS[channel.index()])?;
            return self.storage.delete(NAMESPACE, key);
        }
        let blob = postcard::to_allocvec(entries).map_err(|_| StorageError::IoError)?;
        self.storage.write(NAMESPACE, key, &blob)?;
        info!("ScheduleStore: {channel} saved {} entries ({} bytes)", entries.len(), blob.len());
        Ok(())
    }
}

impl<S: StoragePort> EventSink for ScheduleStore<S> {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ScheduleChanged { channel, entries } => {
                if let Err(e) = self.save(*channel, entries) {
                    warn!("ScheduleStore: {channel} save failed: {e}");
                }
            }
            AppEvent::ScheduleFired { channel, marks } => {
                if let Err(e) = self.save_fired(*channel, marks) {
                    warn!("ScheduleStore: {channel} fired marks not saved: {e}");
                }
            }
            _ => {}
        }
    }
}

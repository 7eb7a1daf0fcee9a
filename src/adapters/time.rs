//! Clock adapter: monotonic uptime plus SNTP-synchronised local time.
//!
//! Implements [`ClockPort`].
//!
//! - **`target_os = "espidf"`**: uptime from `esp_timer_get_time()`; wall
//!   clock from `gettimeofday()` kept in sync by `EspSntp`.
//! - **`not(target_os = "espidf")`**: `std::time` for host-side runs.
//!
//! Local time is UTC plus the configured fixed offset.  Anything before
//! 2020-01-01 is treated as "never synced" and reads as `None`.

use log::info;

use crate::app::ports::ClockPort;
use crate::scheduler::LocalTime;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};

/// 2020-01-01T00:00:00Z.
const EPOCH_2020: i64 = 1_577_836_800;

pub struct SntpClock {
    utc_offset_secs: i32,
    #[cfg(target_os = "espidf")]
    sntp: Option<EspSntp<'static>>,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl SntpClock {
    /// Clock without a time source yet; `local_time()` stays `None` until
    /// [`start_sntp`](Self::start_sntp) succeeds (on device).
    pub fn new(utc_offset_secs: i32) -> Self {
        Self {
            utc_offset_secs,
            #[cfg(target_os = "espidf")]
            sntp: None,
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Begin background SNTP sync against `server`.
    #[cfg(target_os = "espidf")]
    pub fn start_sntp(&mut self, server: &str) -> Result<(), crate::error::CommsError> {
        let mut conf = SntpConf::default();
        conf.servers[0] = server;
        let sntp = EspSntp::new(&conf).map_err(|e| {
            log::error!("SNTP: init failed: {e}");
            crate::error::CommsError::SntpInitFailed
        })?;
        self.sntp = Some(sntp);
        info!("SNTP: syncing against {server}");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start_sntp(&mut self, server: &str) -> Result<(), crate::error::CommsError> {
        info!("SNTP(sim): host clock stands in for {server}");
        Ok(())
    }

    /// First sync has completed.
    #[cfg(target_os = "espidf")]
    pub fn is_synced(&self) -> bool {
        self.sntp
            .as_ref()
            .is_some_and(|s| s.get_sync_status() == SyncStatus::Completed)
            || self.utc_secs().is_some()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn is_synced(&self) -> bool {
        self.utc_secs().is_some()
    }

    /// Current UTC seconds, or `None` if the clock is obviously unset.
    #[cfg(target_os = "espidf")]
    fn utc_secs(&self) -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: `tv` is a valid out-pointer; the timezone argument may be null.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = i64::from(tv.tv_sec);
        (secs >= EPOCH_2020).then_some(secs)
    }

    #[cfg(not(target_os = "espidf"))]
    fn utc_secs(&self) -> Option<i64> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();
        let secs = i64::try_from(secs).ok()?;
        (secs >= EPOCH_2020).then_some(secs)
    }
}

impl ClockPort for SntpClock {
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        // SAFETY: reads the monotonic high-resolution timer.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn local_time(&self) -> Option<LocalTime> {
        LocalTime::from_unix(self.utc_secs()?, self.utc_offset_secs)
    }
}

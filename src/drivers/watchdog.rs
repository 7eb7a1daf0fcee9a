//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the run loop stalls.
//! A stalled loop means stalled pump countdowns, so a reset (which forces
//! every relay off at boot) is the safe outcome.
//!
//! The run loop must call `feed()` on every iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    timeout_ms: u32,
}

impl Watchdog {
    /// Configure the TWDT and subscribe the current task.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            let ok = ESP_OK as esp_err_t;
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // SAFETY: plain FFI calls with a valid config; main task only.
            let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
            if ret != ok {
                log::warn!("TWDT reconfigure returned {ret} (may already be configured)");
            }
            let subscribed = unsafe { esp_task_wdt_add(core::ptr::null_mut()) } == ok;
            if subscribed {
                info!("Watchdog: subscribed ({timeout_ms} ms timeout, panic on trigger)");
            } else {
                log::warn!("Watchdog: failed to subscribe");
            }
            Self {
                subscribed,
                timeout_ms,
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op ({timeout_ms} ms)");
            Self { timeout_ms }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Feed the watchdog.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: the current task subscribed in `new`.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}

//! Output drivers: GPIO pins, status LED, task watchdog.

pub mod gpio;
pub mod status_led;
pub mod watchdog;

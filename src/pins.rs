//! GPIO pin assignments for the irrigation controller board.
//!
//! Single source of truth; every driver references this module rather than
//! hard-coding pin numbers.  [`SystemConfig`](crate::config::SystemConfig)
//! defaults are taken from here.

// ---------------------------------------------------------------------------
// Pump relays (2-channel relay module, opto-isolated)
// ---------------------------------------------------------------------------

/// Relay input for pump 1.
pub const RELAY_PUMP1_GPIO: i32 = 26;
/// Relay input for pump 2.
pub const RELAY_PUMP2_GPIO: i32 = 27;

/// Most cheap relay modules energise the coil when the input is pulled LOW.
pub const RELAY_ACTIVE_LOW: bool = true;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// Built-in LED on the ESP32 DevKit (active HIGH).
pub const STATUS_LED_GPIO: i32 = 2;

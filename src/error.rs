//! Unified error types for the irrigation firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! run loop's error handling uniform.  All variants are `Copy` so they can be
//! carried inside status reports and events without allocation.
//!
//! Nothing in the control core is fatal: every [`ControlError`] degrades to
//! "command ignored, error reported" and the loop keeps ticking.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A pump or schedule command was rejected.
    Control(ControlError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Persistent storage failed.
    Storage(crate::app::ports::StorageError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control(e) => write!(f, "control: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Control errors (pump controller, schedule engine, command router)
// ---------------------------------------------------------------------------

/// Conditions raised by the control core.  Each one is recovered locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// Requested run duration is zero or negative.
    InvalidDuration,
    /// A schedule entry failed validation; the whole batch was rejected.
    InvalidSchedule(&'static str),
    /// An inbound message could not be decoded.
    MalformedPayload(&'static str),
    /// A lower-priority request was ignored (scheduled start during a run).
    Suppressed,
    /// The broker link is down; surfaced as a status flag.
    TransportUnavailable,
}

impl ControlError {
    /// Stable machine-readable tag used in status payloads.
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidDuration => "invalid_duration",
            Self::InvalidSchedule(_) => "invalid_schedule",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::Suppressed => "suppressed",
            Self::TransportUnavailable => "transport_unavailable",
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDuration => write!(f, "duration must be at least 1 ms"),
            Self::InvalidSchedule(why) => write!(f, "invalid schedule: {why}"),
            Self::MalformedPayload(why) => write!(f, "malformed payload: {why}"),
            Self::Suppressed => write!(f, "suppressed by active manual run"),
            Self::TransportUnavailable => write!(f, "broker unavailable"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<ControlError> for Error {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    MqttConnectFailed,
    MqttSubscribeFailed,
    SntpInitFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::MqttConnectFailed => write!(f, "MQTT connect failed"),
            Self::MqttSubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::SntpInitFailed => write!(f, "SNTP init failed"),
        }
    }
}

impl std::error::Error for CommsError {}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

impl From<crate::app::ports::StorageError> for Error {
    fn from(e: crate::app::ports::StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (relays, clock, transport, event sinks, storage) implement
//! these traits.  The [`AppService`](super::service::AppService) consumes them
//! via generics, so the domain core never touches hardware directly.
//!
//! ## Contract notes
//!
//! - **RelayPort** speaks logical on/off only.  Polarity is the adapter's job.
//! - **TransportPort::publish** must not block the run loop.
//! - **StoragePort** writes MUST be atomic: no partial writes on power loss.

use crate::control::channel::PumpChannel;
use crate::scheduler::LocalTime;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to switch pump relays.
pub trait RelayPort {
    /// Energise (`true`) or release (`false`) the relay for `channel`.
    fn set(&mut self, channel: PumpChannel, on: bool);

    /// Last commanded logical state.
    fn is_on(&self, channel: PumpChannel) -> bool;

    /// Release every relay.
    fn all_off(&mut self) {
        for ch in PumpChannel::ALL {
            self.set(ch, false);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: system timer + SNTP → domain)
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;

    /// Local wall-clock time, or `None` before the first time sync.
    fn local_time(&self) -> Option<LocalTime>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / MQTT / NVS)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT
/// status topics, schedule persistence, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: &super::events::AppEvent) {
        (**self).emit(event);
    }
}

/// Fan-out: deliver each event to both sinks, in order.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ MQTT broker)
// ───────────────────────────────────────────────────────────────

/// Publish/subscribe messaging over the broker connection.
///
/// Reconnection is the adapter's responsibility; the core only asks
/// whether the link is up.  Inbound messages do not flow through this
/// trait: the adapter queues them for the run loop.
pub trait TransportPort {
    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Queue a message for delivery.  Must return promptly.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool)
    -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for schedules.
///
/// Keys are namespaced to prevent collisions between subsystems.  The
/// ESP-IDF NVS API guarantees atomic commits natively; in-memory
/// simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples the schedule engine from the pumps)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the schedule engine invokes when an entry fires.
///
/// The engine knows nothing about pumps or relays; the service implements
/// this to turn a firing into a `scheduled` pump start.
pub trait SchedulerDelegate {
    fn on_schedule_fired(&mut self, fire: ScheduleFire);
}

/// Payload passed to [`SchedulerDelegate::on_schedule_fired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleFire {
    pub channel: PumpChannel,
    pub entry_id: u8,
    pub duration_ms: u32,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`TransportPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No broker session.
    NotConnected,
    /// The client refused the request (queue full, topic too long, …).
    Rejected,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored blob failed to decode.
    Corrupted,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Rejected => write!(f, "rejected by client"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored data corrupted"),
        }
    }
}

impl std::error::Error for TransportError {}

impl std::error::Error for StorageError {}

//! Inbound message queue: MQTT client task → run loop.
//!
//! Uses an `embassy-sync` bounded channel so the client's event task can
//! hand messages to the synchronous control loop without heap allocation
//! or locks held across the core.
//!
//! ```text
//! ┌──────────────┐  InboundMessage  ┌──────────────┐
//! │ MQTT client  │─────────────────▶│  Run loop    │
//! │ (ESP-IDF)    │   INBOUND (8)    │  (sync)      │
//! └──────────────┘                  └──────────────┘
//! ```
//!
//! When the queue is full the newest message is dropped; the broker
//! redelivers QoS 1 traffic and every command is idempotent.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Longest topic the firmware ever subscribes to, with headroom.
pub const TOPIC_CAP: usize = 64;

/// Largest payload accepted (a full 8-entry schedule fits comfortably).
pub const PAYLOAD_CAP: usize = 1024;

/// Channel depth for inbound messages.
const INBOUND_DEPTH: usize = 8;

/// One message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<TOPIC_CAP>,
    pub payload: heapless::Vec<u8, PAYLOAD_CAP>,
    /// Topic or payload exceeded its buffer; the router rejects the message.
    pub truncated: bool,
}

impl InboundMessage {
    pub fn new(topic: &str, payload: &[u8]) -> Self {
        let mut truncated = false;

        let mut t = heapless::String::new();
        if t.push_str(topic).is_err() {
            truncated = true;
        }

        let take = payload.len().min(PAYLOAD_CAP);
        truncated |= take < payload.len();
        let mut p = heapless::Vec::new();
        // `take` is within capacity.
        let _ = p.extend_from_slice(&payload[..take]);

        Self {
            topic: t,
            payload: p,
            truncated,
        }
    }
}

pub type InboundQueue = Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_DEPTH>;

/// Inbound channel: MQTT client task → run loop.
pub static INBOUND: InboundQueue = Channel::new();

/// Non-blocking enqueue.  Returns `false` if the message was dropped.
pub fn offer(queue: &InboundQueue, topic: &str, payload: &[u8]) -> bool {
    match queue.try_send(InboundMessage::new(topic, payload)) {
        Ok(()) => true,
        Err(_) => {
            warn!("MQTT: inbound queue full, dropped message on '{topic}'");
            false
        }
    }
}

/// Non-blocking dequeue for the run loop.
pub fn next(queue: &InboundQueue) -> Option<InboundMessage> {
    queue.try_receive().ok()
}

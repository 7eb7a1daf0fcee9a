//! MQTT protocol layer.
//!
//! Everything between raw broker messages and the application core:
//!
//! ```text
//!  EspMqttClient task ──▶ inbound::INBOUND ──▶ router::CommandRouter ──▶ AppService
//!                                              (topics + codec)
//!  AppService ──▶ AppEvent ──▶ publisher::StatusPublisher ──▶ TransportPort
//! ```
//!
//! No module here touches ESP-IDF; the client itself lives in
//! [`crate::adapters::mqtt`].

pub mod codec;
pub mod inbound;
pub mod publisher;
pub mod router;
pub mod topics;

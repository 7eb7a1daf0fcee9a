//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements         | Connects to                 |
//! |------------------|--------------------|-----------------------------|
//! | `log_sink`       | EventSink          | Serial log output           |
//! | `mqtt`           | TransportPort      | ESP-IDF MQTT client (TLS)   |
//! | `nvs`            | StoragePort        | NVS / in-memory store       |
//! | `relay`          | RelayPort          | Two GPIO relay outputs      |
//! | `schedule_store` | EventSink          | Schedule blobs in storage   |
//! | `time`           | ClockPort          | esp_timer + SNTP            |
//! | `wifi`           | ConnectivityPort   | ESP-IDF WiFi STA            |

pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod relay;
pub mod schedule_store;
pub mod time;
pub mod wifi;

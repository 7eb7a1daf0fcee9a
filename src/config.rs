//! System configuration parameters
//!
//! All tunable parameters for the irrigation controller.  The struct is built
//! once at boot and passed by reference to every component; there is no
//! runtime reconfiguration.
//!
//! Credentials are injected at build time (`IRRIGATION_WIFI_SSID`,
//! `IRRIGATION_WIFI_PASS`, `IRRIGATION_MQTT_HOST`, `IRRIGATION_MQTT_USER`,
//! `IRRIGATION_MQTT_PASS`) so they never live in the source tree.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pins;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- WiFi ---
    pub wifi_ssid: String,
    pub wifi_password: String,

    // --- MQTT broker ---
    pub mqtt_host: String,
    /// 8883 = MQTT over TLS.
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_password: String,
    pub mqtt_client_id: String,

    // --- GPIO ---
    /// Relay pin per pump, indexed by [`PumpChannel::index`](crate::control::channel::PumpChannel::index).
    pub relay_pins: [i32; 2],
    /// Status LED pin.
    pub led_pin: i32,
    /// Relay energises on a LOW input.
    pub relay_active_low: bool,

    // --- Pump ---
    /// Run time used when a start command carries no duration (ms).
    pub default_pump_duration_ms: u32,
    /// Hard ceiling on continuous pump activation (ms).
    pub max_pump_duration_ms: u32,

    // --- Timing ---
    /// Schedule evaluation interval (ms).
    pub schedule_check_interval_ms: u32,
    /// Unsolicited status publication interval (ms).
    pub heartbeat_interval_ms: u32,
    /// Run loop period; bounds the pump countdown jitter (ms).
    pub control_tick_ms: u32,

    // --- Time ---
    pub ntp_server: String,
    /// Local time offset from UTC (seconds).
    pub utc_offset_secs: i32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: option_env!("IRRIGATION_WIFI_SSID")
                .unwrap_or("YOUR_WIFI_SSID")
                .into(),
            wifi_password: option_env!("IRRIGATION_WIFI_PASS")
                .unwrap_or("YOUR_WIFI_PASSWORD")
                .into(),

            mqtt_host: option_env!("IRRIGATION_MQTT_HOST")
                .unwrap_or("broker.hivemq.cloud")
                .into(),
            mqtt_port: 8883,
            mqtt_user: option_env!("IRRIGATION_MQTT_USER")
                .unwrap_or("esp32")
                .into(),
            mqtt_password: option_env!("IRRIGATION_MQTT_PASS")
                .unwrap_or("")
                .into(),
            mqtt_client_id: "esp32-irrigation".into(),

            relay_pins: [pins::RELAY_PUMP1_GPIO, pins::RELAY_PUMP2_GPIO],
            led_pin: pins::STATUS_LED_GPIO,
            relay_active_low: pins::RELAY_ACTIVE_LOW,

            default_pump_duration_ms: 30_000, // 30 s
            max_pump_duration_ms: 300_000,    // 5 min safety limit

            schedule_check_interval_ms: 60_000, // 1/min
            heartbeat_interval_ms: 60_000,      // 1/min
            control_tick_ms: 250,               // 4 Hz

            ntp_server: "pool.ntp.org".into(),
            utc_offset_secs: 19_800, // IST = UTC+5:30
        }
    }
}

impl SystemConfig {
    /// Broker URL in the form the ESP-IDF MQTT client expects.
    pub fn mqtt_url(&self) -> String {
        let scheme = if self.mqtt_port == 8883 { "mqtts" } else { "mqtt" };
        format!("{}://{}:{}", scheme, self.mqtt_host, self.mqtt_port)
    }

    /// Range-check every field.  Called once at boot; an invalid config
    /// halts bring-up rather than running pumps with nonsense limits.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_pump_duration_ms == 0 {
            return Err(Error::Config("max_pump_duration_ms must be > 0"));
        }
        if self.default_pump_duration_ms == 0
            || self.default_pump_duration_ms > self.max_pump_duration_ms
        {
            return Err(Error::Config(
                "default_pump_duration_ms must be 1..=max_pump_duration_ms",
            ));
        }
        if !(1_000..=3_600_000).contains(&self.schedule_check_interval_ms) {
            return Err(Error::Config(
                "schedule_check_interval_ms must be 1000–3600000",
            ));
        }
        if !(1_000..=3_600_000).contains(&self.heartbeat_interval_ms) {
            return Err(Error::Config("heartbeat_interval_ms must be 1000–3600000"));
        }
        // The countdown must run at least once per second.
        if !(10..=1_000).contains(&self.control_tick_ms) {
            return Err(Error::Config("control_tick_ms must be 10–1000"));
        }
        if !(-14 * 3600..=14 * 3600).contains(&self.utc_offset_secs) {
            return Err(Error::Config("utc_offset_secs must be within ±14h"));
        }
        if self.relay_pins[0] == self.relay_pins[1] {
            return Err(Error::Config("relay pins must differ"));
        }
        if self.relay_pins.contains(&self.led_pin) {
            return Err(Error::Config("LED pin collides with a relay pin"));
        }
        if self.mqtt_host.is_empty() || self.mqtt_client_id.is_empty() {
            return Err(Error::Config("mqtt_host and mqtt_client_id are required"));
        }
        Ok(())
    }
}

//! Irrigation Controller Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single poll-driven run loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RelayBank         LogEventSink   NvsAdapter    SntpClock      │
//! │  (RelayPort)       (EventSink)    (Storage)     (ClockPort)    │
//! │  WifiAdapter       MqttAdapter    StatusPublisher ScheduleStore│
//! │  (Connectivity)    (Transport)    (EventSink)   (EventSink)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  PumpController · ScheduleEngine                       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  MQTT event thread ──INBOUND──▶ CommandRouter ──▶ AppService    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use irrigation::adapters::log_sink::LogEventSink;
use irrigation::adapters::mqtt::{MqttAdapter, MqttSettings, Subscriptions};
use irrigation::adapters::nvs::NvsAdapter;
use irrigation::adapters::relay::RelayBank;
use irrigation::adapters::schedule_store::ScheduleStore;
use irrigation::adapters::time::SntpClock;
use irrigation::adapters::wifi::{ConnectivityPort, WifiAdapter};
use irrigation::app::ports::{ClockPort, TransportPort};
use irrigation::app::service::AppService;
use irrigation::config::SystemConfig;
use irrigation::control::channel::PumpChannel;
use irrigation::drivers::gpio::OutputGpio;
use irrigation::drivers::status_led::StatusLed;
use irrigation::drivers::watchdog::Watchdog;
use irrigation::mqtt::inbound::{self, INBOUND};
use irrigation::mqtt::publisher::StatusPublisher;
use irrigation::mqtt::router::CommandRouter;

const WATCHDOG_TIMEOUT_MS: u32 = 10_000;
const MQTT_KEEP_ALIVE_SECS: u64 = 30;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Irrigation v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = SystemConfig::default();
    config.validate()?;

    // ── 2. Relays first: both pumps off before anything else ──
    // Driving the inactive level at configure time avoids a boot glitch.
    let inactive_high = config.relay_active_low;
    let relay_pins = [
        OutputGpio::new(config.relay_pins[0], inactive_high)?,
        OutputGpio::new(config.relay_pins[1], inactive_high)?,
    ];
    let mut relays = RelayBank::new(relay_pins, config.relay_active_low);
    let mut led = StatusLed::new(OutputGpio::new(config.led_pin, false)?);
    let watchdog = Watchdog::new(WATCHDOG_TIMEOUT_MS);

    // ── 3. Persistence ────────────────────────────────────────
    let store = ScheduleStore::new(NvsAdapter::new()?);
    let mut app = AppService::new(config.clone());
    for ch in PumpChannel::ALL {
        match store.load(ch) {
            Ok(Some(entries)) => {
                if let Err(e) = app.load_schedule(ch, &entries) {
                    warn!("Saved {ch} schedule rejected ({e}), starting empty");
                    continue;
                }
                match store.load_fired(ch) {
                    Ok(Some(marks)) => app.restore_fired(ch, &marks),
                    Ok(None) => {}
                    Err(e) => warn!("Saved {ch} fired marks unreadable ({e})"),
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Saved {ch} schedule unreadable ({e}), starting empty"),
        }
    }

    // ── 4. Network bring-up ───────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_part = EspDefaultNvsPartition::take()?;
    let mut wifi = WifiAdapter::new(EspWifi::new(peripherals.modem, sysloop, Some(nvs_part))?);

    let mut clock = SntpClock::new(config.utc_offset_secs);

    wifi.set_credentials(&config.wifi_ssid, &config.wifi_password)?;
    if let Err(e) = wifi.connect(clock.uptime_ms()) {
        // The adapter is already in backoff; the loop keeps retrying.
        warn!("WiFi: initial connect failed: {e}");
    }
    clock.start_sntp(&config.ntp_server)?;

    let url = config.mqtt_url();
    let transport = MqttAdapter::connect(&MqttSettings {
        url: &url,
        client_id: &config.mqtt_client_id,
        username: &config.mqtt_user,
        password: &config.mqtt_password,
        keep_alive_secs: MQTT_KEEP_ALIVE_SECS,
    })
    .context("MQTT client")?;

    // Log + publish + persist, in that order.
    let mut sink = (LogEventSink::new(), (StatusPublisher::new(transport), store));

    app.start(&mut relays, &mut sink);
    info!("System ready. Entering run loop.");

    // ── 5. Run loop ───────────────────────────────────────────
    let tick = Duration::from_millis(u64::from(config.control_tick_ms));
    let mut subscriptions = Subscriptions::new();
    loop {
        let now_ms = clock.uptime_ms();

        // Broker link: resubscribe on every (re)connect until it sticks,
        // then let the service refresh the retained status topics.
        let publisher = &mut sink.1.0;
        let reconnected = publisher.transport_mut().take_reconnected();
        // A failure stays pending and is retried next iteration.
        let _ = subscriptions.service(reconnected, publisher.transport_mut());
        let link_up = publisher.transport().is_connected();
        app.set_transport_available(link_up, now_ms, &mut sink);

        // Inbound commands queued by the MQTT event thread.
        while let Some(msg) = inbound::next(&INBOUND) {
            // Failures are already reported on the status topic.
            let _ = CommandRouter::dispatch(&msg, &mut app, now_ms, &mut relays, &mut sink);
        }

        app.tick(now_ms, clock.local_time(), &mut relays, &mut sink);

        wifi.poll(now_ms);
        led.update(link_up && wifi.is_connected(), now_ms);
        watchdog.feed();

        std::thread::sleep(tick);
    }
}

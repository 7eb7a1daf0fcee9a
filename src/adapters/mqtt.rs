//! MQTT broker adapter.
//!
//! Implements [`TransportPort`].
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` over TLS (certificate
//!   bundle), with a last-will of `offline` retained on `plant/status`.
//!   A dedicated thread drains the connection's event stream: received
//!   messages are pushed into [`INBOUND`](crate::mqtt::inbound::INBOUND),
//!   link changes flip atomics the run loop reads.
//! - **all other targets**: a loopback that records subscriptions and
//!   publishes so host tests can assert on them.
//!
//! Publishing uses `enqueue`, which never blocks on the network.

use log::{info, warn};

use crate::app::ports::{TransportError, TransportPort};
use crate::error::CommsError;
use crate::mqtt::topics;

#[cfg(target_os = "espidf")]
use std::sync::Arc;
#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
};

/// Broker connection parameters, borrowed from
/// [`SystemConfig`](crate::config::SystemConfig).
pub struct MqttSettings<'a> {
    pub url: &'a str,
    pub client_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub keep_alive_secs: u64,
}

// ───────────────────────────────────────────────────────────────
// Device implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct MqttAdapter {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
    /// Set by the event thread on every (re)connect; cleared by the loop.
    reconnected: Arc<AtomicBool>,
}

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    /// Create the client and spawn its event thread.  Connection happens in
    /// the background; watch [`take_reconnected`](Self::take_reconnected).
    pub fn connect(settings: &MqttSettings<'_>) -> Result<Self, CommsError> {
        let conf = MqttClientConfiguration {
            client_id: Some(settings.client_id),
            username: (!settings.username.is_empty()).then_some(settings.username),
            password: (!settings.password.is_empty()).then_some(settings.password),
            keep_alive_interval: Some(core::time::Duration::from_secs(settings.keep_alive_secs)),
            lwt: Some(LwtConfiguration {
                topic: topics::SYSTEM_STATUS,
                payload: topics::OFFLINE.as_bytes(),
                qos: QoS::AtLeastOnce,
                retain: true,
            }),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };

        let (client, mut connection) = EspMqttClient::new(settings.url, &conf).map_err(|e| {
            log::error!("MQTT: client init failed: {e}");
            CommsError::MqttConnectFailed
        })?;

        let connected = Arc::new(AtomicBool::new(false));
        let reconnected = Arc::new(AtomicBool::new(false));
        let (c, r) = (connected.clone(), reconnected.clone());

        std::thread::Builder::new()
            .name("mqtt-events".into())
            .stack_size(6 * 1024)
            .spawn(move || {
                while let Ok(event) = connection.next() {
                    match event.payload() {
                        EventPayload::Connected(_) => {
                            info!("MQTT: connected");
                            c.store(true, Ordering::Release);
                            r.store(true, Ordering::Release);
                        }
                        EventPayload::Disconnected => {
                            warn!("MQTT: disconnected");
                            c.store(false, Ordering::Release);
                        }
                        EventPayload::Received {
                            topic: Some(topic),
                            data,
                            ..
                        } => {
                            crate::mqtt::inbound::offer(&crate::mqtt::inbound::INBOUND, topic, data);
                        }
                        EventPayload::Error(e) => warn!("MQTT: {e}"),
                        _ => {}
                    }
                }
                warn!("MQTT: event stream closed");
                c.store(false, Ordering::Release);
            })
            .map_err(|_| CommsError::MqttConnectFailed)?;

        info!("MQTT: connecting to {}", settings.url);
        Ok(Self {
            client,
            connected,
            reconnected,
        })
    }

    /// `true` once per broker (re)connect.
    pub fn take_reconnected(&mut self) -> bool {
        self.reconnected.swap(false, Ordering::AcqRel)
    }
}

#[cfg(target_os = "espidf")]
impl TransportPort for MqttAdapter {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: subscribe {topic}: {e}");
                TransportError::Rejected
            })
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.client
            .enqueue(topic, QoS::AtLeastOnce, retain, payload)
            .map(|_| ())
            .map_err(|_| TransportError::Rejected)
    }
}

// ───────────────────────────────────────────────────────────────
// Host loopback
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct MqttAdapter {
    connected: bool,
    reconnected: bool,
    /// Subscribe calls left to refuse.
    failing_subscribes: u32,
    /// Every accepted publish, in order: (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    pub subscriptions: Vec<String>,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    pub fn connect(settings: &MqttSettings<'_>) -> Result<Self, CommsError> {
        info!("MQTT(sim): loopback for {}", settings.url);
        Ok(Self::default())
    }

    /// Simulate the broker link going up or down.
    pub fn set_connected(&mut self, up: bool) {
        if up && !self.connected {
            self.reconnected = true;
        }
        self.connected = up;
    }

    pub fn take_reconnected(&mut self) -> bool {
        core::mem::take(&mut self.reconnected)
    }

    /// Make the next `n` subscribe calls fail as the client would when
    /// its outbox is full.
    pub fn sim_fail_subscribes(&mut self, n: u32) {
        self.failing_subscribes = n;
    }
}

#[cfg(not(target_os = "espidf"))]
impl TransportPort for MqttAdapter {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.failing_subscribes > 0 {
            self.failing_subscribes -= 1;
            return Err(TransportError::Rejected);
        }
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.into());
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.published.push((topic.into(), payload.to_vec(), retain));
        Ok(())
    }
}

/// Subscribe to every inbound topic.  Called after each (re)connect since
/// the client uses a clean session.
pub fn subscribe_all<T: TransportPort>(transport: &mut T) -> Result<(), TransportError> {
    for topic in topics::SUBSCRIPTIONS {
        transport.subscribe(topic)?;
    }
    info!("MQTT: subscribed to {} topics", topics::SUBSCRIPTIONS.len());
    Ok(())
}

/// Keeps the inbound subscriptions owed after a (re)connect until
/// [`subscribe_all`] succeeds.
#[derive(Debug, Default)]
pub struct Subscriptions {
    pending: bool,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Run once per loop iteration with the adapter's reconnect flag.
    /// Retries while the link is up and a subscription is still owed.
    pub fn service<T: TransportPort>(
        &mut self,
        reconnected: bool,
        transport: &mut T,
    ) -> Result<(), CommsError> {
        self.pending |= reconnected;
        if !self.pending || !transport.is_connected() {
            return Ok(());
        }
        subscribe_all(transport).map_err(|e| {
            warn!("MQTT: subscribe failed ({e}), retrying");
            CommsError::MqttSubscribeFailed
        })?;
        self.pending = false;
        Ok(())
    }
}

//! Status publisher: turns application events into retained MQTT messages.
//!
//! Implements [`EventSink`] on top of any [`TransportPort`].  While the
//! broker link is down, events are dropped: status topics are retained and
//! fully refreshed on the next reconnect and heartbeat, so nothing needs
//! to be buffered.

use log::{debug, warn};

use crate::app::events::{AppEvent, StatusReport, SystemStatus};
use crate::app::ports::{EventSink, TransportPort};

use super::codec;
use super::topics;

pub struct StatusPublisher<T: TransportPort> {
    transport: T,
    published: u32,
    failed: u32,
}

impl<T: TransportPort> StatusPublisher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            published: 0,
            failed: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// (published, failed) counters since boot.
    pub fn counters(&self) -> (u32, u32) {
        (self.published, self.failed)
    }

    fn send(&mut self, topic: &str, body: &[u8]) {
        if !self.transport.is_connected() {
            debug!("MQTT: offline, skipped publish to {topic}");
            return;
        }
        match self.transport.publish(topic, body, true) {
            Ok(()) => self.published = self.published.wrapping_add(1),
            Err(e) => {
                self.failed = self.failed.wrapping_add(1);
                warn!("MQTT: publish to {topic} failed: {e}");
            }
        }
    }

    fn send_summary(&mut self, status: &SystemStatus) {
        match codec::encode_heartbeat(status) {
            Ok(body) => self.send(topics::SYSTEM_STATUS, &body),
            Err(e) => warn!("MQTT: summary encode failed: {e}"),
        }
    }

    fn send_status(&mut self, report: &StatusReport) {
        match codec::encode_status(report) {
            Ok(body) => self.send(topics::pump_status(report.channel), &body),
            Err(e) => warn!("MQTT: status encode failed: {e}"),
        }
    }
}

impl<T: TransportPort> EventSink for StatusPublisher<T> {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::PumpStatus(report) => self.send_status(report),
            AppEvent::StatusSummary(status) => self.send_summary(status),
            AppEvent::Heartbeat(status) => {
                self.send_summary(status);
                for report in &status.pumps {
                    self.send_status(report);
                }
            }
            AppEvent::TransportChanged(true) => {
                self.send(topics::SYSTEM_STATUS, topics::ONLINE.as_bytes());
            }
            // Rejections reach the status topic through the PumpStatus
            // that follows them; schedules are never echoed back.
            AppEvent::TransportChanged(false)
            | AppEvent::CommandRejected { .. }
            | AppEvent::ScheduleChanged { .. }
            | AppEvent::ScheduleFired { .. }
            | AppEvent::Started => {}
        }
    }
}

//! Command router: inbound topic + payload → [`AppCommand`].
//!
//! The router is stateless.  It never retries; duplicate deliveries are
//! safe because start (refresh) and stop are idempotent.

use log::debug;

use crate::app::commands::AppCommand;
use crate::app::ports::{EventSink, RelayPort};
use crate::app::service::AppService;
use crate::control::channel::PumpChannel;
use crate::error::ControlError;

use super::codec::{self, SetRequest};
use super::inbound::InboundMessage;
use super::topics::{self, InboundTopic};

/// A message that could not be turned into a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Pump the message was aimed at, if the topic says so.
    pub channel: Option<PumpChannel>,
    pub error: ControlError,
}

pub struct CommandRouter;

impl CommandRouter {
    /// Decode one message.  Pure: no state is touched.
    pub fn decode(
        topic: &str,
        payload: &[u8],
        max_duration_ms: u32,
    ) -> Result<AppCommand, Rejection> {
        let Some(parsed) = InboundTopic::parse(topic) else {
            return Err(Rejection {
                channel: topics::channel_hint(topic),
                error: ControlError::MalformedPayload("unknown topic"),
            });
        };
        let channel = parsed.channel();
        let reject = |error| Rejection {
            channel: Some(channel),
            error,
        };

        match parsed {
            InboundTopic::Set(_) => match codec::decode_set(payload).map_err(reject)? {
                SetRequest::Start { duration_ms } => Ok(AppCommand::Start {
                    channel,
                    duration_ms,
                }),
                SetRequest::Stop => Ok(AppCommand::Stop { channel }),
            },
            InboundTopic::Schedule(_) => {
                let entries = codec::decode_schedule(payload, max_duration_ms).map_err(reject)?;
                Ok(AppCommand::ReplaceSchedule { channel, entries })
            }
        }
    }

    /// Decode and apply one inbound message.  Failures are reported through
    /// the service (status topic + `CommandRejected`) and returned.
    pub fn dispatch(
        msg: &InboundMessage,
        app: &mut AppService,
        now_ms: u64,
        relays: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<(), ControlError> {
        debug!("MQTT rx [{}] {} bytes", msg.topic, msg.payload.len());

        let decoded = if msg.truncated {
            Err(Rejection {
                channel: topics::channel_hint(&msg.topic),
                error: ControlError::MalformedPayload("message too large"),
            })
        } else {
            Self::decode(&msg.topic, &msg.payload, app.config().max_pump_duration_ms)
        };

        match decoded {
            Ok(cmd) => app.handle_command(cmd, now_ms, relays, sink),
            Err(Rejection { channel, error }) => {
                app.reject(channel, error, now_ms, sink);
                Err(error)
            }
        }
    }
}

//! # Message Dispatcher
//!
//! Entry point for everything the transport delivers. Each raw payload is
//! parsed as an envelope, classified by its `msg` tag and handed to the
//! matching decoder. The outcome goes onto the result channel the dispatcher
//! was built with.
//!
//! ```text
//! raw bytes ──► CommandEnvelope::parse ──► MessageKind
//!                    │                        ├─ CURRENT-STATE       ─► ProductState
//!                    │                        ├─ ENVIRONMENTAL-...   ─► EnvironmentState
//!                    │                        ├─ STATE-CHANGE        ─► ProductState (diff)
//!                    │                        ├─ DEVICE-CREDENTIALS  ─► DeviceCredentials
//!                    │                        └─ anything else       ─► warn!, nothing sent
//!                    └─ parse error ─► Err(DecodeError::Envelope)
//! ```
//!
//! `on_message` runs on the transport's delivery task. It never awaits and never
//! blocks: a full channel drops the result with a warning.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::decoder;
use super::envelope::{CommandEnvelope, MessageKind};
use super::error::DecodeError;
use super::states::{DeviceCredentials, EnvironmentState, ProductState};

/// Decoded inbound message, one variant per command tag we understand.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    CurrentState(ProductState),
    /// Only the fields that changed are set
    StateChange(ProductState),
    Environment(EnvironmentState),
    Credentials(DeviceCredentials),
}

pub type DecodeResult = Result<DeviceMessage, DecodeError>;

/// Classifies and decodes a raw payload.
///
/// Returns `None` for command tags without a decoder. Those are logged and
/// otherwise ignored.
pub fn decode(raw: &[u8]) -> Option<DecodeResult> {
    let envelope = match CommandEnvelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => return Some(Err(e)),
    };

    let decoded = match envelope.kind() {
        MessageKind::EnvironmentalSensorData => {
            decoder::decode_environment_state(envelope.data.as_ref()).map(DeviceMessage::Environment)
        }
        MessageKind::CurrentState => {
            decoder::decode_product_state(envelope.product_state.as_ref())
                .map(DeviceMessage::CurrentState)
        }
        MessageKind::DeviceCredentials => {
            decoder::decode_credentials(raw).map(DeviceMessage::Credentials)
        }
        MessageKind::StateChange => {
            decoder::decode_state_change(envelope.product_state.as_ref())
                .map(DeviceMessage::StateChange)
        }
        other => {
            warn!(
                "Unknown state update: {}, json={}",
                other,
                String::from_utf8_lossy(raw)
            );
            return None;
        }
    };
    Some(decoded)
}

/// Feeds decode results from the transport into a consumer channel.
#[derive(Clone, Debug)]
pub struct MessageDispatcher {
    sink: mpsc::Sender<DecodeResult>,
}

impl MessageDispatcher {
    pub fn new(sink: mpsc::Sender<DecodeResult>) -> Self {
        Self { sink }
    }

    /// Creates a dispatcher together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DecodeResult>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Handles one delivered message. Emits at most one result.
    pub fn on_message(&self, topic: &str, raw: &[u8]) {
        debug!("<< {}: {}", topic, String::from_utf8_lossy(raw));

        let Some(result) = decode(raw) else {
            return;
        };
        if let Err(e) = &result {
            debug!("Decode of message on {} failed: {}", topic, e);
        }

        match self.sink.try_send(result) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Result channel full, dropping message from {}", topic);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Result channel closed, dropping message from {}", topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    const TOPIC: &str = "475/NN4-CH-HEA0429A/status/current";

    #[test]
    fn current_state_is_decoded() {
        let (dispatcher, mut rx) = MessageDispatcher::channel(8);
        dispatcher.on_message(
            TOPIC,
            br#"{"msg":"CURRENT-STATE","time":"2019-03-01T10:00:00.000Z","mode-reason":"LAPP","product-state":{"fmod":"FAN","fnsp":"0004","filf":"2087"}}"#,
        );
        match rx.try_recv().unwrap() {
            Ok(DeviceMessage::CurrentState(state)) => {
                assert_eq!(state.fan_mode.as_deref(), Some("FAN"));
                assert_eq!(state.fan_speed.as_deref(), Some("0004"));
                assert_eq!(state.filter_life.as_deref(), Some("2087"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn environment_reads_data_member() {
        let result = decode(
            br#"{"msg":"ENVIRONMENTAL-CURRENT-SENSOR-DATA","time":"t","data":{"tact":"2956","hact":"0046"}}"#,
        );
        match result {
            Some(Ok(DeviceMessage::Environment(env))) => {
                assert_eq!(env.temperature.as_deref(), Some("2956"));
                assert_eq!(env.humidity.as_deref(), Some("0046"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn state_change_uses_diff_decoding() {
        let result = decode(
            br#"{"msg":"STATE-CHANGE","time":"t","product-state":{"fmod":["OFF","FAN"],"fnsp":["0004","0007"],"bogus":"x"}}"#,
        );
        match result {
            Some(Ok(DeviceMessage::StateChange(state))) => {
                assert_eq!(state.fan_mode.as_deref(), Some("FAN"));
                assert_eq!(state.fan_speed.as_deref(), Some("0007"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn credentials_come_from_the_top_level() {
        let result = decode(
            br#"{"msg":"DEVICE-CREDENTIALS","time":"t","serialNumber":"NN4-CH-HEA0429A","apPasswordHash":"c2VjcmV0"}"#,
        );
        assert_eq!(
            result.unwrap().unwrap(),
            DeviceMessage::Credentials(DeviceCredentials {
                serial_number: "NN4-CH-HEA0429A".into(),
                password_hash: "c2VjcmV0".into(),
            })
        );
    }

    #[test]
    fn null_time_still_dispatches() {
        let result = decode(
            br#"{"msg":"CURRENT-STATE","time":null,"product-state":{"fmod":"FAN"}}"#,
        );
        match result {
            Some(Ok(DeviceMessage::CurrentState(state))) => {
                assert_eq!(state.fan_mode.as_deref(), Some("FAN"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_tags_produce_nothing() {
        let (dispatcher, mut rx) = MessageDispatcher::channel(8);
        dispatcher.on_message(TOPIC, br#"{"msg":"FOO-BAR","time":"t"}"#);
        dispatcher.on_message(TOPIC, br#"{"msg":"STATE-SET","time":"t","data":{}}"#);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn malformed_input_is_reported_not_fatal() {
        let (dispatcher, mut rx) = MessageDispatcher::channel(8);
        dispatcher.on_message(TOPIC, b"\xff\xfe garbage");
        dispatcher.on_message(
            TOPIC,
            br#"{"msg":"STATE-CHANGE","time":"t","product-state":[1,2]}"#,
        );
        assert!(matches!(rx.try_recv().unwrap(), Err(DecodeError::Envelope(_))));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(DecodeError::PayloadShape { .. })
        ));
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (dispatcher, mut rx) = MessageDispatcher::channel(1);
        let raw = br#"{"msg":"CURRENT-STATE","time":"t","product-state":{"fmod":"OFF"}}"#;
        dispatcher.on_message(TOPIC, raw);
        dispatcher.on_message(TOPIC, raw);
        assert!(rx.try_recv().unwrap().is_ok());
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn closed_channel_is_tolerated() {
        let (dispatcher, rx) = MessageDispatcher::channel(1);
        drop(rx);
        dispatcher.on_message(TOPIC, br#"{"msg":"CURRENT-STATE","time":"t"}"#);
    }
}

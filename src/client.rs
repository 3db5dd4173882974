//! # Device Client
//!
//! Binds the outbound command builders to a concrete pub/sub transport. The
//! client knows which topic a command goes to and which QoS the device
//! expects; the transport only moves bytes.
//!
//! ## Topics
//!
//! ```text
//! <model>/<username>/command         - everything we publish (QoS 1)
//! <model>/<username>/status/current  - state replies and notifications (QoS 0)
//! <model>/<username>/credentials     - bootstrap replies (QoS 0)
//! ```
//!
//! Replies are not awaited here. They arrive through the transport and the
//! [`MessageDispatcher`](crate::protocol::MessageDispatcher) like any other
//! message.

use async_trait::async_trait;
use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use crate::protocol::{commands, CommandEnvelope, EncodeError, FanState};

pub const TOPIC_COMMAND: &str = "command";
pub const TOPIC_STATUS: &str = "status/current";
pub const TOPIC_CREDENTIALS: &str = "credentials";

/// Account an unconfigured device accepts during wifi bootstrap
pub const BOOTSTRAP_USERNAME: &str = "initialconnection";

/// Hardware family. Its code is the first segment of every topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceModel {
    /// Pure Cool Link tower
    #[default]
    #[serde(rename = "475")]
    PureCoolLink,
    /// Pure Cool Link desk
    #[serde(rename = "469")]
    PureCoolLinkDesk,
    /// Pure Hot+Cool Link
    #[serde(rename = "455")]
    PureHotCoolLink,
}

impl DeviceModel {
    pub fn code(&self) -> &'static str {
        match self {
            DeviceModel::PureCoolLink => "475",
            DeviceModel::PureCoolLinkDesk => "469",
            DeviceModel::PureHotCoolLink => "455",
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown device model '{0}', expected one of 475, 469, 455")]
pub struct UnknownModel(pub String);

impl FromStr for DeviceModel {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "475" => Ok(DeviceModel::PureCoolLink),
            "469" => Ok(DeviceModel::PureCoolLinkDesk),
            "455" => Ok(DeviceModel::PureHotCoolLink),
            other => Err(UnknownModel(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("transport is closed")]
    Closed,
}

/// The two operations the client needs from a pub/sub transport.
///
/// Inbound delivery is not part of this trait; transports push received
/// payloads into a [`MessageDispatcher`](crate::protocol::MessageDispatcher).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError>;

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Command side of one remote device.
pub struct DeviceClient<T> {
    transport: T,
    model: DeviceModel,
    username: String,
}

impl<T: Transport> DeviceClient<T> {
    pub fn new(transport: T, model: DeviceModel, username: impl Into<String>) -> Self {
        Self {
            transport,
            model,
            username: username.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `<model>/<username>/<suffix>`
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}/{}", self.model.code(), self.username, suffix)
    }

    /// Subscribes to state replies and change notifications.
    pub async fn subscribe_status(&self) -> Result<(), ClientError> {
        self.transport
            .subscribe(&self.topic(TOPIC_STATUS), QoS::AtMostOnce)
            .await?;
        Ok(())
    }

    /// Sets the fan to the given state. Unset fields keep their device value.
    pub async fn set_state(&self, state: &FanState) -> Result<(), ClientError> {
        let envelope = commands::build_set_state(state)?;
        self.send_command(envelope).await
    }

    /// Asks the device to publish `CURRENT-STATE` and
    /// `ENVIRONMENTAL-CURRENT-SENSOR-DATA`.
    pub async fn request_current_state(&self) -> Result<(), ClientError> {
        self.send_command(commands::build_request_current_state())
            .await
    }

    /// Joins an unconfigured device to a wifi network.
    ///
    /// Subscribes to the bootstrap account's credentials topic, then switches
    /// this client to that account and publishes join, authorise and close in
    /// that order. A failed subscribe leaves the client untouched.
    /// The device answers with `DEVICE-CREDENTIALS` on the credentials topic.
    pub async fn wifi_bootstrap(&mut self, ssid: &str, password: &str) -> Result<(), ClientError> {
        info!("Bootstrapping {} device onto network {}", self.model, ssid);

        let credentials = format!(
            "{}/{}/{}",
            self.model.code(),
            BOOTSTRAP_USERNAME,
            TOPIC_CREDENTIALS
        );
        self.transport
            .subscribe(&credentials, QoS::AtMostOnce)
            .await?;
        self.username = BOOTSTRAP_USERNAME.to_string();
        for envelope in commands::bootstrap_sequence(ssid, password) {
            self.send_command(envelope).await?;
        }
        Ok(())
    }

    /// Stamps, encodes and publishes one envelope to the command topic.
    pub async fn send_command(&self, mut envelope: CommandEnvelope) -> Result<(), ClientError> {
        let raw = envelope.encode()?;
        let topic = self.topic(TOPIC_COMMAND);
        debug!("SENDTO {}: {}", topic, String::from_utf8_lossy(&raw));
        self.transport
            .publish(&topic, raw, QoS::AtLeastOnce)
            .await?;
        Ok(())
    }
}

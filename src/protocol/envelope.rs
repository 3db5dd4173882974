//! # Envelope Codec
//!
//! Every message in either direction is one JSON object:
//!
//! ```text
//! { "msg": "STATE-SET",
//!   "time": "2016-10-24T19:45:09.000000000Z",
//!   "mode-reason"?: "LAPP",
//!   "data"?: {...}, "product-state"?: {...},
//!   "requestId"?: "...", "id"?: "...", "ssid"?: "...", "password"?: "..." }
//! ```
//!
//! Optional members that are unset are left out of the JSON entirely. The device
//! treats `"data": null` or `"ssid": ""` differently from a missing key.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::error::{DecodeError, EncodeError};
use super::states::is_unset;

/// Command tags understood by the fan firmware.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Full product state, reply to `REQUEST-CURRENT-STATE`
    CurrentState,
    /// Sensor readings, reply to `REQUEST-CURRENT-STATE`
    EnvironmentalSensorData,
    /// Unsolicited `[old, new]` diff of changed fields
    StateChange,
    JoinNetwork,
    AuthoriseUserRequest,
    CloseAccessPoint,
    /// Serial number and AP password hash after bootstrap
    DeviceCredentials,
    SetState,
    RequestCurrentState,
    /// Anything else. Carries the tag as received.
    Unrecognized(String),
}

impl MessageKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "CURRENT-STATE" => MessageKind::CurrentState,
            "ENVIRONMENTAL-CURRENT-SENSOR-DATA" => MessageKind::EnvironmentalSensorData,
            "STATE-CHANGE" => MessageKind::StateChange,
            "JOIN-NETWORK" => MessageKind::JoinNetwork,
            "AUTHORISE-USER-REQUEST" => MessageKind::AuthoriseUserRequest,
            "CLOSE-ACCESS-POINT" => MessageKind::CloseAccessPoint,
            "DEVICE-CREDENTIALS" => MessageKind::DeviceCredentials,
            "STATE-SET" => MessageKind::SetState,
            "REQUEST-CURRENT-STATE" => MessageKind::RequestCurrentState,
            other => MessageKind::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::CurrentState => "CURRENT-STATE",
            MessageKind::EnvironmentalSensorData => "ENVIRONMENTAL-CURRENT-SENSOR-DATA",
            MessageKind::StateChange => "STATE-CHANGE",
            MessageKind::JoinNetwork => "JOIN-NETWORK",
            MessageKind::AuthoriseUserRequest => "AUTHORISE-USER-REQUEST",
            MessageKind::CloseAccessPoint => "CLOSE-ACCESS-POINT",
            MessageKind::DeviceCredentials => "DEVICE-CREDENTIALS",
            MessageKind::SetState => "STATE-SET",
            MessageKind::RequestCurrentState => "REQUEST-CURRENT-STATE",
            MessageKind::Unrecognized(tag) => tag.as_str(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_absent(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// The wire envelope.
///
/// `data` and `product-state` stay untyped here; which record they hold depends
/// on the command tag and is resolved by the dispatcher.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CommandEnvelope {
    #[serde(rename = "msg", default, deserialize_with = "null_as_empty")]
    pub command: String,
    #[serde(rename = "time", default, deserialize_with = "null_as_empty")]
    pub timestamp: String,
    #[serde(rename = "mode-reason", default, skip_serializing_if = "is_unset")]
    pub mode_reason: Option<String>,
    #[serde(default, skip_serializing_if = "is_absent")]
    pub data: Option<Value>,
    #[serde(rename = "product-state", default, skip_serializing_if = "is_absent")]
    pub product_state: Option<Value>,
    #[serde(rename = "requestId", default, skip_serializing_if = "is_unset")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_unset")]
    pub id: Option<String>,
    #[serde(rename = "ssid", default, skip_serializing_if = "is_unset")]
    pub wifi_ssid: Option<String>,
    #[serde(rename = "password", default, skip_serializing_if = "is_unset")]
    pub wifi_password: Option<String>,
}

impl CommandEnvelope {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            command: kind.as_str().to_string(),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_tag(&self.command)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_mode_reason(mut self, reason: impl Into<String>) -> Self {
        self.mode_reason = Some(reason.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_wifi(mut self, ssid: impl Into<String>, password: impl Into<String>) -> Self {
        self.wifi_ssid = Some(ssid.into());
        self.wifi_password = Some(password.into());
        self
    }

    /// Stamps the envelope with the current UTC time and serializes it.
    ///
    /// Any timestamp already present is overwritten.
    pub fn encode(&mut self) -> Result<Vec<u8>, EncodeError> {
        self.encode_at(Utc::now())
    }

    /// Same as [`encode`](Self::encode) with an explicit instant.
    pub fn encode_at(&mut self, at: DateTime<Utc>) -> Result<Vec<u8>, EncodeError> {
        self.timestamp = format_timestamp(at);
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses raw bytes as received from the transport.
    pub fn parse(raw: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(raw).map_err(DecodeError::Envelope)?;
        if !value.is_object() {
            return Err(DecodeError::Envelope(serde::de::Error::custom(
                "envelope is not a JSON object",
            )));
        }
        serde_json::from_value(value).map_err(DecodeError::Envelope)
    }
}

/// `null` reads as an empty string, same as a missing key.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `2016-10-24T19:45:09.123456789Z`: UTC, always nine fractional digits.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

//! Error types for the protocol adapter

use thiserror::Error;

/// Failure to turn an inbound payload into a typed record.
///
/// These are values, not crashes: the dispatcher puts them on the result
/// channel next to successful decodes and keeps going with the next message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The raw bytes are not a JSON envelope at all
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// A recognized command carried a payload of the wrong shape
    #[error("unexpected payload shape for {command}: {reason}")]
    PayloadShape {
        command: &'static str,
        reason: String,
    },
}

impl DecodeError {
    pub(crate) fn shape(command: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::PayloadShape {
            command,
            reason: reason.into(),
        }
    }
}

/// Failure to serialize an outbound envelope
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

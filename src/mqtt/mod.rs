//! # MQTT Transport
//!
//! Connects to the broker that runs on the fan itself and moves bytes between
//! it and the protocol adapter.
//!
//! ```text
//! mqtt/
//! ├── config.rs        - Broker address, account and client settings
//! └── mqtt_handler.rs  - rumqttc event loop, `Transport` implementation, status
//! ```
//!
//! The event loop task is the only place inbound messages enter the crate. Each
//! incoming publish is handed synchronously to the
//! [`MessageDispatcher`](crate::protocol::MessageDispatcher); decoded results
//! leave through its channel. Subscriptions are replayed on every `ConnAck`,
//! the device forgets them when it drops a session.
//!
//! The broker password is never the plaintext from the sticker; see
//! [`hash_password`](crate::protocol::hash_password).

pub mod config;
pub mod mqtt_handler;

pub use config::MqttConfig;
pub use mqtt_handler::{ConnectionState, MqttHandler, MqttStatus, MqttTransport};

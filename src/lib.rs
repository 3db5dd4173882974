//! # dyslink
//!
//! Local control of Dyson Pure Cool Link fans through the MQTT broker that
//! runs on the device.
//!
//! ```text
//! protocol/  - envelope codec, state records, decoders, dispatcher, commands
//! client.rs  - topics and QoS on top of a `Transport`
//! mqtt/      - rumqttc backed `Transport` and event loop
//! web/       - axum status and control panel
//! config.rs  - TOML configuration
//! ```

pub mod client;
pub mod config;
pub mod mqtt;
pub mod protocol;
pub mod web;

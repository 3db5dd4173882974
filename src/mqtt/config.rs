use rumqttc::MqttOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::DeviceModel;
use crate::config::ConfigError;
use crate::protocol::hash_password;

pub const DEFAULT_PORT: u16 = 1883;

/// Connection settings for the broker running on the fan.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    /// Device address, without port
    pub host: String,
    pub port: u16,
    /// Part of the setup SSID, e.g. `NN4-CH-HEA0322B`
    pub username: String,
    /// Plaintext password from the sticker. Hashed before it goes on the wire.
    pub password: String,
    pub model: DeviceModel,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Buffer between the event loop and whoever consumes decoded messages
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "10.0.42.137".to_string(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            model: DeviceModel::default(),
            client_id: "dyslink".to_string(),
            keep_alive_secs: 30,
            channel_capacity: 100,
        }
    }
}

impl MqttConfig {
    /// Accepts `host` or `host:port`.
    pub fn set_address(&mut self, address: &str) -> Result<(), ConfigError> {
        match address.rsplit_once(':') {
            Some((host, port)) => {
                self.port = port.parse().map_err(|e| {
                    ConfigError::Invalid(format!("port in address '{}': {}", address, e))
                })?;
                self.host = host.to_string();
            }
            None => self.host = address.to_string(),
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// What the device broker expects as password: the hashed sticker password.
    pub fn broker_password(&self) -> String {
        hash_password(&self.password)
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options
            .set_credentials(self.username.clone(), self.broker_password())
            .set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        options
    }
}

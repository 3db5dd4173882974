//! Application configuration.
//!
//! Read from `<config dir>/dyslink/config.toml` unless a path is given. A
//! missing default file is not an error, the defaults below are used instead.
//!
//! ```toml
//! debug = false
//!
//! [mqtt]
//! host = "10.0.42.137"
//! port = 1883
//! username = "NN4-CH-HEA0429A"
//! password = "sticker-password"
//! model = "475"
//!
//! [web]
//! listen = "127.0.0.1:9033"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::mqtt::MqttConfig;

const CONFIG_DIR: &str = "dyslink";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    pub listen: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9033".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Log every payload in and out
    pub debug: bool,
    pub mqtt: MqttConfig,
    pub web: WebConfig,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads `path`, or the default location when `path` is `None`.
    ///
    /// Only an explicitly given file has to exist.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => {
                    debug!("No config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        if !exists && !required {
            debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DeviceModel;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::parse(
            r#"
            [mqtt]
            username = "NN4-CH-HEA0429A"
            model = "455"
            "#,
        )
        .unwrap();
        assert_eq!(config.mqtt.username, "NN4-CH-HEA0429A");
        assert_eq!(config.mqtt.model, DeviceModel::PureHotCoolLink);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.web.listen, "127.0.0.1:9033");
        assert!(!config.debug);
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(AppConfig::parse("[mqtt]\nmodel = \"999\"\n").is_err());
    }

    #[tokio::test]
    async fn load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "debug = true\n[web]\nlisten = \"0.0.0.0:8080\"").unwrap();

        let config = AppConfig::load(Some(file.path())).await.unwrap();
        assert!(config.debug);
        assert_eq!(config.web.listen, "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing)).await,
            Err(ConfigError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn broken_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mqtt\nport = ").unwrap();
        assert!(matches!(
            AppConfig::load(Some(file.path())).await,
            Err(ConfigError::Parse { .. })
        ));
    }
}

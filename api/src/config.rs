//! Push gateway configuration, loaded from `config.yml`.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Default configuration file, expected in the working directory.
pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub ios: IosConfig,
    #[serde(default)]
    pub android: AndroidConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Full URL of the gateway's push endpoint.
    pub url: String,
    #[serde(default = "GatewayConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GatewayConfig {
    fn default_timeout_secs() -> u64 {
        10
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IosConfig {
    #[serde(default)]
    pub enabled: bool,
    /// APNs topic, usually the app's bundle id. Required by the gateway in
    /// production.
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AndroidConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl PushConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Read(e.to_string()))?;
        let config: PushConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.url.is_empty() {
            return Err(ConfigError::Invalid("gateway.url must be set".into()));
        }
        if !self.ios.enabled && !self.android.enabled {
            return Err(ConfigError::Invalid(
                "at least one of ios or android must be enabled".into(),
            ));
        }
        if self.ios.enabled && self.ios.topic.is_none() {
            return Err(ConfigError::Invalid(
                "ios.topic is required when ios is enabled".into(),
            ));
        }
        Ok(())
    }
}

//! Bridge settings
//!
//! Loaded from built-in defaults, then an optional TOML file, then the
//! `E2L_ADDRESS` / `E2L_PORT` environment variables. Command-line flags are
//! applied on top by the binary.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding [`BridgeSettings::address`]
pub const ENV_ADDRESS: &str = "E2L_ADDRESS";
/// Environment variable overriding [`BridgeSettings::port`]
pub const ENV_PORT: &str = "E2L_PORT";

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// Server settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Listen address
    pub address: String,
    /// Listen port
    pub port: u16,
    /// Width of render targets created for screen-capture observers
    pub capture_width: u32,
    /// Height of render targets created for screen-capture observers
    pub capture_height: u32,
    /// Tick length used when `step` omits `delta_time`
    pub default_delta_time: f64,
    /// Tick count used when `step` omits `num_ticks`
    pub default_num_ticks: u32,
    /// Socket read size; messages larger than this span several reads
    pub read_chunk_size: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 6025,
            capture_width: 86,
            capture_height: 86,
            default_delta_time: 1.0 / 60.0,
            default_num_ticks: 4,
            read_chunk_size: 8192,
        }
    }
}

impl BridgeSettings {
    /// Parse settings from TOML; absent keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(source)?)
    }

    /// Read settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Apply `E2L_ADDRESS` / `E2L_PORT` from the process environment
    pub fn apply_env(&mut self) -> Result<(), SettingsError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        if let Some(address) = lookup(ENV_ADDRESS) {
            self.address = address;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port.trim().parse().map_err(|_| SettingsError::InvalidEnv {
                var: ENV_PORT,
                value: port.clone(),
            })?;
        }
        Ok(())
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.address.trim().is_empty() || self.port == 0 {
            return Err(SettingsError::Invalid(format!(
                "No settings for either address ({}) or port ({})!",
                self.address, self.port
            )));
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(SettingsError::Invalid(
                "capture resolution must be non-zero".to_string(),
            ));
        }
        if !(self.default_delta_time.is_finite() && self.default_delta_time > 0.0) {
            return Err(SettingsError::Invalid(
                "default_delta_time must be a positive number".to_string(),
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(SettingsError::Invalid(
                "read_chunk_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `address:port` for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.bind_address(), "127.0.0.1:6025");
        assert_eq!((settings.capture_width, settings.capture_height), (86, 86));
        assert_eq!(settings.default_num_ticks, 4);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = BridgeSettings::from_toml_str(
            r#"
            port = 7000
            capture_width = 128
            "#,
        )
        .unwrap();
        assert_eq!(settings.port, 7000);
        assert_eq!(settings.capture_width, 128);
        assert_eq!(settings.capture_height, 86);
        assert_eq!(settings.address, "127.0.0.1");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            BridgeSettings::from_toml_str("port = \"many\""),
            Err(SettingsError::Toml(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = BridgeSettings::default();
        settings
            .apply_overrides(|var| match var {
                ENV_ADDRESS => Some("0.0.0.0".to_string()),
                ENV_PORT => Some("9001".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.bind_address(), "0.0.0.0:9001");

        let err = settings
            .apply_overrides(|var| (var == ENV_PORT).then(|| "http".to_string()))
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnv { var: ENV_PORT, .. }));
    }

    #[test]
    fn test_missing_address_or_port() {
        let settings = BridgeSettings {
            port: 0,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("No settings for either address"));
    }
}

//! Configuration loading for the stockroom client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stockroom_store::CacheConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub requests_channel_url: String,
    pub inventory_channel_url: String,
    pub finance_channel_url: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
    /// Whether submit calls ask the server to send a notification email.
    pub notify_email: bool,
    pub cache: CacheSettings,
    pub reconnect: ReconnectConfig,
    /// Directory for the durable cache tier; omit for memory-only.
    pub durable_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    pub memory_ttl_ms: u64,
    pub durable_ttl_ms: u64,
    pub page_cap: usize,
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_memory_ttl(Duration::from_millis(self.memory_ttl_ms))
            .with_durable_ttl(Duration::from_millis(self.durable_ttl_ms))
            .with_page_cap(self.page_cap)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.requests_channel_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "requests_channel_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.inventory_channel_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "inventory_channel_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.finance_channel_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "finance_channel_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.memory_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.memory_ttl_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.durable_ttl_ms < self.cache.memory_ttl_ms {
            return Err(ConfigError::InvalidValue {
                field: "cache.durable_ttl_ms",
                reason: "must be >= cache.memory_ttl_ms".to_string(),
            });
        }
        if self.cache.page_cap == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.page_cap",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.max_ms < self.reconnect.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> String {
        r#"
            api_base_url = "https://stockroom.example/api"
            requests_channel_url = "wss://stockroom.example/ws/requests"
            inventory_channel_url = "wss://stockroom.example/ws/inventory"
            finance_channel_url = "wss://stockroom.example/ws/finance"
            request_timeout_ms = 10000
            notify_email = true

            [auth]
            api_key = "key"

            [cache]
            memory_ttl_ms = 30000
            durable_ttl_ms = 86400000
            page_cap = 25

            [reconnect]
            initial_ms = 500
            max_ms = 30000
            multiplier = 2.0
            jitter_ms = 250
        "#
        .to_string()
    }

    #[test]
    fn test_parse_valid_config() {
        let config = ClientConfig::from_toml(&base_toml()).expect("valid config");
        assert_eq!(config.api_base_url, "https://stockroom.example/api");
        assert!(config.durable_dir.is_none());
        assert_eq!(config.cache.page_cap, 25);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = base_toml().replace("notify_email = true", "notify_email = true\nsurprise = 1");
        assert!(matches!(
            ClientConfig::from_toml(&toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = base_toml().replace("request_timeout_ms = 10000", "request_timeout_ms = 0");
        let err = ClientConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "request_timeout_ms",
                ..
            }
        ));
    }

    #[test]
    fn test_durable_ttl_must_cover_memory_ttl() {
        let toml = base_toml().replace("durable_ttl_ms = 86400000", "durable_ttl_ms = 1000");
        let err = ClientConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "cache.durable_ttl_ms",
                ..
            }
        ));
    }

    #[test]
    fn test_reconnect_multiplier_below_one_rejected() {
        let toml = base_toml().replace("multiplier = 2.0", "multiplier = 0.5");
        assert!(ClientConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_cache_settings_conversion() {
        let config = ClientConfig::from_toml(&base_toml()).expect("valid config");
        let cache = config.cache.to_cache_config();
        assert_eq!(cache.memory_ttl, Duration::from_secs(30));
        assert_eq!(cache.durable_ttl, Duration::from_secs(86400));
        assert_eq!(cache.page_cap, 25);
    }
}

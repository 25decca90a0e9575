//! Service configuration with TOML file support.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{PolicyConfig, ServiceOptions, TokenConfig};
use crate::error::ConfigError;
use crate::logging::LogFormat;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listen address for the HTTP API
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Trained model artifact (JSON)
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Filter directive, e.g. "info" or "info,smartcaptcha=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub tokens: TokenConfig,

    #[serde(default)]
    pub service: ServiceOptions,

    #[serde(default)]
    pub cors: CorsConfig,
}

/// Cross-origin settings for the browser widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsConfig {
    /// `["*"]` allows any origin (without credentials)
    #[serde(default = "default_allow_origins")]
    pub allow_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { allow_origins: default_allow_origins() }
    }
}

impl CorsConfig {
    pub fn is_wildcard(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }
}

fn default_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model/smartcaptcha_model.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_allow_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            model_path: default_model_path(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            policy: PolicyConfig::default(),
            tokens: TokenConfig::default(),
            service: ServiceOptions::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load and validate a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.trim().is_empty() {
            return Err(ConfigError::Invalid("addr is empty".into()));
        }
        self.policy.thresholds.validate()?;
        self.policy.sanity.validate()?;
        self.tokens.validate()?;
        self.service.validate()?;
        if self.cors.allow_origins.is_empty() {
            return Err(ConfigError::Invalid("cors.allow_origins is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FaultPolicy, MissingModelPolicy, Thresholds};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.tokens.ttl_secs, 120);
        assert!(!config.policy.sanity.enabled);
        assert_eq!(config.service.missing_model, MissingModelPolicy::Reject);
        assert_eq!(config.service.on_model_fault, FaultPolicy::Clamp);
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml_str(
            r#"
            addr = "0.0.0.0:9000"
            model_path = "/srv/model.json"
            log_format = "json"
            log_level = "debug"

            [policy]
            thresholds = { kind = "banded", low = 0.3, high = 0.7 }

            [policy.sanity]
            enabled = true

            [tokens]
            ttl_secs = 60
            shards = 4

            [service]
            token_on_suspicious = true
            on_model_fault = "reject"
            missing_model = { mode = "fallback", probability = 0.1 }

            [cors]
            allow_origins = ["https://shop.example"]
            "#,
        )
        .unwrap();

        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.policy.thresholds, Thresholds::Banded { low: 0.3, high: 0.7 });
        assert!(config.policy.sanity.enabled);
        assert_eq!(config.tokens.ttl_secs, 60);
        assert_eq!(config.tokens.sweep_interval_secs, 30);
        assert_eq!(config.service.missing_model, MissingModelPolicy::Fallback { probability: 0.1 });
        assert_eq!(config.service.on_model_fault, FaultPolicy::Reject);
        assert!(config.service.issue_tokens);
        assert!(!config.cors.is_wildcard());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = AppConfig::from_toml_str(
            r#"
            [policy]
            thresholds = { kind = "banded", low = 0.8, high = 0.2 }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_oversized_token_ttl_rejected() {
        let err = AppConfig::from_toml_str("[tokens]\nttl_secs = 100000000000000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_mode_is_parse_error() {
        let err = AppConfig::from_toml_str(
            r#"
            [service]
            missing_model = { mode = "guess" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_shipped_config_is_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/smartcaptcha.toml");
        let config = AppConfig::from_toml_file(path).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_toml_file("/nonexistent/smartcaptcha.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

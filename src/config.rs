//! Configuration module
//!
//! Reads the TOML configuration file (default
//! `~/.config/link-order/config.toml`, or `LINK_ORDER_CONFIG`). Every
//! section falls back to its defaults when omitted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::{LinkOrderSettings, DEFAULT_QUERY_PARAMETER, DEFAULT_REDIRECT_TARGET};
use crate::domain::TaxState;
use crate::infrastructure::SalesChannelDefaults;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("link-order")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub link_order: LinkOrderConfig,
    pub sales_channel: SalesChannelConfig,
    pub admin: AdminConfig,
    /// Products served by the in-memory catalog
    pub catalog: Vec<ProductSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkOrderConfig {
    /// Initial rule string, `code=price=shippingFlag;...`
    pub article_and_prices: String,
    pub query_parameter: String,
    pub redirect_target: String,
    /// Inject a console error script into HTML pages when adding fails
    pub annotate_errors: bool,
}

impl Default for LinkOrderConfig {
    fn default() -> Self {
        Self {
            article_and_prices: String::new(),
            query_parameter: DEFAULT_QUERY_PARAMETER.to_string(),
            redirect_target: DEFAULT_REDIRECT_TARGET.to_string(),
            annotate_errors: true,
        }
    }
}

impl From<&LinkOrderConfig> for LinkOrderSettings {
    fn from(cfg: &LinkOrderConfig) -> Self {
        Self {
            query_parameter: cfg.query_parameter.clone(),
            redirect_target: cfg.redirect_target.clone(),
            annotate_errors: cfg.annotate_errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesChannelConfig {
    pub id: String,
    /// Shown on the storefront pages
    pub name: String,
    pub language_id: String,
    pub currency_id: String,
    pub tax_state: TaxState,
}

impl Default for SalesChannelConfig {
    fn default() -> Self {
        let defaults = SalesChannelDefaults::default();
        Self {
            id: defaults.sales_channel_id,
            name: "Storefront".to_string(),
            language_id: defaults.language_id,
            currency_id: defaults.currency_id,
            tax_state: defaults.tax_state,
        }
    }
}

impl From<&SalesChannelConfig> for SalesChannelDefaults {
    fn from(cfg: &SalesChannelConfig) -> Self {
        Self {
            sales_channel_id: cfg.id.clone(),
            language_id: cfg.language_id.clone(),
            currency_id: cfg.currency_id.clone(),
            tax_state: cfg.tax_state,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Key expected in `X-API-Key`. The admin routes are not served without one.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSeed {
    /// Generated when omitted
    #[serde(default)]
    pub id: Option<String>,
    pub product_number: String,
    pub name: String,
}

impl AppConfig {
    /// Load and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link_order.query_parameter.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "link_order.query_parameter must not be empty".into(),
            ));
        }
        let target = &self.link_order.redirect_target;
        if !target.starts_with('/') || target.starts_with("//") || target.starts_with("/\\") {
            return Err(ConfigError::Invalid(format!(
                "link_order.redirect_target must be a site path, got {:?}",
                target
            )));
        }
        if let Some(key) = &self.admin.api_key {
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "admin.api_key must not be blank; omit it to disable the admin API".into(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for seed in &self.catalog {
            if seed.product_number.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "catalog entries need a product_number".into(),
                ));
            }
            if !seen.insert(seed.product_number.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate catalog product_number {}",
                    seed.product_number
                )));
            }
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

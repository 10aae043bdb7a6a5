//! Configuration for mailtable

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// LDAP backend configuration
    #[serde(default)]
    pub ldap: LdapSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Settings shared by every LDAP table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapSettings {
    /// Maximum search filter length; expanded filters may grow to twice this
    #[serde(default = "default_max_filter_len")]
    pub max_filter_len: usize,
}

impl Default for LdapSettings {
    fn default() -> Self {
        Self {
            max_filter_len: default_max_filter_len(),
        }
    }
}

fn default_max_filter_len() -> usize {
    1024
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        if config.ldap.max_filter_len == 0 {
            return Err(crate::Error::Config(
                "ldap.max_filter_len must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }
}

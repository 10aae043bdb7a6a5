//! Directory server configurations
//!
//! Configurations are parsed once from `key value` text and cached by
//! identifier in a [`ConfigRegistry`] shared by all LDAP tables.

use mailtable_common::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Placeholder replaced by the lookup key in filter templates
pub const KEY_PLACEHOLDER: &str = "%k";

const KNOWN_KEYS: &[&str] = &[
    "identifier",
    "url",
    "username",
    "password",
    "basedn",
    "filter",
    "attribute",
    "page_size",
];

/// Configuration of one directory server
#[derive(Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Unique name in the registry
    pub identifier: String,
    /// Server URL, `ldap://host[:port]`
    pub url: String,
    /// Bind DN; empty for anonymous binds
    pub username: String,
    pub password: String,
    /// Search base DN
    pub basedn: String,
    /// Filter template containing [`KEY_PLACEHOLDER`]
    pub filter: String,
    /// Attribute holding the expansion values
    pub attribute: String,
    /// Entries requested per page
    pub page_size: u32,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("identifier", &self.identifier)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***REDACTED***")
            .field("basedn", &self.basedn)
            .field("filter", &self.filter)
            .field("attribute", &self.attribute)
            .field("page_size", &self.page_size)
            .finish()
    }
}

fn default_page_size() -> u32 {
    100
}

impl DirectoryConfig {
    /// Parse a configuration from `key value` lines
    pub fn parse(text: &str) -> Result<Self> {
        let mut pairs = parse_pairs(text)?;

        let Some(url) = pairs.remove("url") else {
            warn!("ldap: missing 'url' configuration");
            return Err(Error::Config("missing 'url' configuration".to_string()));
        };

        let filter = pairs
            .remove("filter")
            .ok_or_else(|| Error::Config("missing 'filter' configuration".to_string()))?;
        if !filter.contains(KEY_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "filter '{}' does not contain {}",
                filter, KEY_PLACEHOLDER
            )));
        }

        let attribute = pairs
            .remove("attribute")
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::Config("missing 'attribute' configuration".to_string()))?;

        let page_size = match pairs.remove("page_size") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| Error::Config(format!("invalid page_size '{}'", value)))?,
            None => default_page_size(),
        };

        Ok(Self {
            identifier: pairs.remove("identifier").unwrap_or_else(|| url.clone()),
            url,
            username: pairs.remove("username").unwrap_or_default(),
            password: pairs.remove("password").unwrap_or_default(),
            basedn: pairs.remove("basedn").unwrap_or_default(),
            filter,
            attribute,
            page_size,
        })
    }
}

/// Split configuration text into key/value pairs
fn parse_pairs(text: &str) -> Result<HashMap<String, String>> {
    let mut pairs = HashMap::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once(char::is_whitespace).ok_or_else(|| {
            Error::Config(format!("line {}: missing value for '{}'", index + 1, line))
        })?;

        if !KNOWN_KEYS.contains(&key) {
            return Err(Error::Config(format!(
                "line {}: unknown key '{}'",
                index + 1,
                key
            )));
        }

        if pairs
            .insert(key.to_string(), unquote(value.trim()).to_string())
            .is_some()
        {
            return Err(Error::Config(format!(
                "line {}: duplicate key '{}'",
                index + 1,
                key
            )));
        }
    }

    Ok(pairs)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Registry of directory configurations keyed by identifier
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: RwLock<HashMap<String, Arc<DirectoryConfig>>>,
}

impl ConfigRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a configuration by identifier
    pub async fn find(&self, identifier: &str) -> Option<Arc<DirectoryConfig>> {
        self.configs.read().await.get(identifier).cloned()
    }

    /// Parse a configuration and register it.
    ///
    /// Registered configurations are immutable: if the identifier is already
    /// known, the cached configuration is returned.
    pub async fn register_from_text(&self, text: &str) -> Result<Arc<DirectoryConfig>> {
        let config = DirectoryConfig::parse(text)?;

        let mut configs = self.configs.write().await;
        if let Some(existing) = configs.get(&config.identifier) {
            debug!(identifier = %config.identifier, "ldap configuration already registered");
            return Ok(existing.clone());
        }

        info!(identifier = %config.identifier, url = %config.url, "registered ldap configuration");
        let config = Arc::new(config);
        configs.insert(config.identifier.clone(), config.clone());
        Ok(config)
    }

    /// Number of registered configurations
    pub async fn len(&self) -> usize {
        self.configs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.configs.read().await.is_empty()
    }
}

//! Configuration for xconf clients
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XconfError};
use crate::keys::DEFAULT_NAMESPACE;

/// Identity used when neither an explicit id nor the host name is available
pub const FALLBACK_IDENTITY: &str = "unknown";

/// Client configuration
///
/// JSON field names follow the options record used by existing deployments:
/// `id`, `endpoints`, `username`, `password`, `namespace`, `cache-dir`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------
    /// Consumer identity matched against gray lists.
    /// Empty selects the host name.
    pub id: String,

    // -------------------------------------------------------------------------
    // Store Connection (consumed by the store transport)
    // -------------------------------------------------------------------------
    /// Store endpoints (host:port)
    pub endpoints: Vec<String>,

    pub username: String,

    pub password: String,

    // -------------------------------------------------------------------------
    // Layout
    // -------------------------------------------------------------------------
    /// Isolates key spaces and cache directories sharing one store
    pub namespace: String,

    /// Root of the local cache
    ///   {cache_dir}/xconf/{namespace}/{group}/{name}
    #[serde(rename = "cache-dir")]
    pub cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: String::new(),
            endpoints: vec!["127.0.0.1:2379".to_string()],
            username: String::new(),
            password: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            cache_dir: std::env::temp_dir(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("id", &self.id)
            .field("endpoints", &self.endpoints)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("namespace", &self.namespace)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a JSON options record; missing fields take their defaults
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let config: Config = serde_json::from_slice(bytes)
            .map_err(|e| XconfError::Config(format!("invalid options: {}", e)))?;
        Ok(config.with_defaults())
    }

    /// Fill empty fields with their defaults
    pub fn with_defaults(mut self) -> Self {
        if self.namespace.is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        if self.cache_dir.as_os_str().is_empty() {
            self.cache_dir = std::env::temp_dir();
        }
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(XconfError::Config("namespace must not be blank".to_string()));
        }
        if self.namespace.contains('/') {
            return Err(XconfError::Config(format!(
                "namespace must not contain '/': {:?}",
                self.namespace
            )));
        }
        if self.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(XconfError::Config("blank store endpoint".to_string()));
        }
        Ok(())
    }

    /// Consumer identity: the configured id, else the host name
    pub fn identity(&self) -> String {
        if !self.id.is_empty() {
            return self.id.clone();
        }
        match whoami::fallible::hostname() {
            Ok(host) if !host.is_empty() => host,
            Ok(_) => FALLBACK_IDENTITY.to_string(),
            Err(e) => {
                tracing::warn!("Cannot determine host name, using {:?}: {}", FALLBACK_IDENTITY, e);
                FALLBACK_IDENTITY.to_string()
            }
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the consumer identity
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Set the store endpoints
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Set the store credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// Set the namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set the cache root directory
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = path.into();
        self
    }

    pub fn build(self) -> Config {
        self.config.with_defaults()
    }
}

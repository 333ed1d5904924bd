//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - Server binding settings
//! - Document store backend, endpoint and application namespace
//! - Identity verification endpoint
//!
//! Secrets only come from the environment, which also overrides file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub identity: IdentityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Rtdb,
    Memory,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub database_url: String,
    /// Namespace all paths live under (`artifacts/{app_id}/...`)
    pub app_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Database secret or access token (FIREBASE_DATABASE_SECRET)
    #[serde(skip)]
    pub credential: Option<String>,
}

/// Identity verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Web API key (FIREBASE_API_KEY)
    #[serde(skip)]
    pub api_key: Option<String>,
    /// `token=uid` pairs accepted by the memory backend (TASKBAZAR_DEV_TOKENS)
    #[serde(skip)]
    pub dev_tokens: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load from TASKBAZAR_CONFIG or config.toml, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var("TASKBAZAR_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))?;
        Ok(config)
    }

    /// Load from specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            // Use embedded default config
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")
        }
    }

    /// Apply environment variables (looked up through `lookup`) on top of file values
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("TASKBAZAR_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("TASKBAZAR_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid TASKBAZAR_PORT value: {}", port))?;
        }
        if let Some(backend) = lookup("TASKBAZAR_STORE") {
            self.store.backend = match backend.as_str() {
                "rtdb" => StoreBackend::Rtdb,
                "memory" => StoreBackend::Memory,
                other => bail!("Unknown TASKBAZAR_STORE backend: {}", other),
            };
        }
        if let Some(url) = lookup("FIREBASE_DATABASE_URL") {
            self.store.database_url = url;
        }
        if let Some(app_id) = lookup("TASKBAZAR_APP_ID") {
            self.store.app_id = app_id;
        }
        self.store.credential = lookup("FIREBASE_DATABASE_SECRET");
        self.identity.api_key = lookup("FIREBASE_API_KEY");
        self.identity.dev_tokens = lookup("TASKBAZAR_DEV_TOKENS");
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            store: StoreConfig {
                backend: StoreBackend::Rtdb,
                database_url: String::new(),
                app_id: "exchange-project-d4028".to_string(),
                timeout_secs: default_timeout_secs(),
                credential: None,
            },
            identity: IdentityConfig {
                base_url: "https://identitytoolkit.googleapis.com".to_string(),
                timeout_secs: default_timeout_secs(),
                api_key: None,
                dev_tokens: None,
            },
        })
    }
}

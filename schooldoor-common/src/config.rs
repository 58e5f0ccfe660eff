//! Configuration loading for SchoolDoor services
//!
//! Resolution priority: environment variable overrides, then TOML config
//! file (path from `SCHOOLDOOR_CONFIG`, default `schooldoor.toml`), then
//! compiled defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Bind address for the HTTP server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// SQLite database path
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Upstream search service configuration
    #[serde(default)]
    pub search: SearchConfig,
}

/// Upstream search service (chat-completion API) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the chat-completions endpoint
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Bearer token for the upstream service
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name sent with each request
    #[serde(default = "default_search_model")]
    pub model: String,

    /// Per-attempt request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum attempts for retryable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_bind_address() -> String {
    "127.0.0.1:5780".to_string()
}

fn default_database_path() -> String {
    "schooldoor.db".to_string()
}

fn default_search_base_url() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}

fn default_search_model() -> String {
    "sonar-pro".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key: None,
            model: default_search_model(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_path: default_database_path(),
            search: SearchConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration: TOML file if present, then environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("SCHOOLDOOR_CONFIG")
            .unwrap_or_else(|_| "schooldoor.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read {}: {}", path, e)))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path, e)))?
        } else {
            ServiceConfig::default()
        };

        // Environment overrides
        if let Ok(db_path) = std::env::var("SCHOOLDOOR_DB") {
            config.database_path = db_path;
        }
        if let Ok(key) = std::env::var("SEARCH_API_KEY") {
            config.search.api_key = Some(key);
        }
        if let Ok(addr) = std::env::var("SCHOOLDOOR_BIND") {
            config.bind_address = addr;
        }

        Ok(config)
    }

    /// Validate that the search API key is configured and non-empty.
    ///
    /// Discovery jobs cannot run without upstream credentials, so this is
    /// checked at startup rather than on first job.
    pub fn require_api_key(&self) -> Result<String> {
        match self.search.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(Error::Config(
                "Search API key not configured. Set SEARCH_API_KEY or add \
                 `api_key` under [search] in the TOML config."
                    .to_string(),
            )),
        }
    }
}

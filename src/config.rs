use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::store::{ListingMode, ResponsePolicy, StoreOptions};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Client timeout for every call except the health probe. Unset means
    /// the transport default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3005".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListingConfig {
    /// `latest_chunk` (documents of the newest chunk time) or `recent`.
    #[serde(default = "default_listing_mode")]
    pub mode: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            mode: default_listing_mode(),
            limit: default_limit(),
        }
    }
}

fn default_listing_mode() -> String {
    "latest_chunk".to_string()
}
fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_include_latest")]
    pub include_latest: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            include_latest: default_include_latest(),
        }
    }
}

fn default_include_latest() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `last_settled` or `latest_dispatched`.
    #[serde(default = "default_response_policy")]
    pub response_policy: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            response_policy: default_response_policy(),
        }
    }
}

fn default_response_policy() -> String {
    "last_settled".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Config {
    /// All defaults. Used when no config file exists at the default path.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Store options derived from `[listing]`, `[stats]` and `[store]`.
    ///
    /// Assumes the config passed [`validate`]; unknown strings fall back to
    /// the defaults.
    pub fn store_options(&self) -> StoreOptions {
        let listing = match self.listing.mode.as_str() {
            "recent" => ListingMode::Recent {
                limit: self.listing.limit,
            },
            _ => ListingMode::LatestChunk,
        };
        let response_policy = match self.store.response_policy.as_str() {
            "latest_dispatched" => ResponsePolicy::LatestDispatched,
            _ => ResponsePolicy::LastSettled,
        };
        StoreOptions {
            listing,
            include_latest_in_stats: self.stats.include_latest,
            response_policy,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate api
    let url = reqwest::Url::parse(&config.api.base_url)
        .with_context(|| format!("api.base_url is not a valid URL: {}", config.api.base_url))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("api.base_url must be http or https, got '{}'", url.scheme());
    }
    if config.api.timeout_secs == Some(0) {
        anyhow::bail!("api.timeout_secs must be >= 1 when set");
    }

    // Validate listing
    match config.listing.mode.as_str() {
        "latest_chunk" | "recent" => {}
        other => anyhow::bail!(
            "Unknown listing mode: '{}'. Must be latest_chunk or recent.",
            other
        ),
    }
    if config.listing.limit == 0 {
        anyhow::bail!("listing.limit must be >= 1");
    }

    // Validate store
    match config.store.response_policy.as_str() {
        "last_settled" | "latest_dispatched" => {}
        other => anyhow::bail!(
            "Unknown response policy: '{}'. Must be last_settled or latest_dispatched.",
            other
        ),
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}

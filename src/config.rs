//! Configuration for the aggregator.
//!
//! The config file is optional — a missing or empty file yields
//! `Config::default()`, whose values are the compiled-in production
//! constants (timeouts, retry budget, refresh interval, the proxy mirror
//! list, and the two court sources). Every URL in the file is validated at
//! load time; the fetcher trusts whatever the configuration accepted.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::feed::{ContentKind, FeedSource, WatcherConfig};
use crate::fetch::{default_proxies, FetchConfig, ProxyEndpoint};
use crate::util::ensure_public_http_url;

/// Superior court RSS feed.
pub const STJ_RSS_URL: &str = "https://res.stj.jus.br/hrestp-c-portalp/RSS.xml";
/// Labor court news listing (HTML; serves no CORS headers and rejects
/// plain clients, so it is reached through the proxies only).
pub const TRT_NEWS_URL: &str =
    "https://www.trt4.jus.br/portais/trt4/modulos/noticias/Jur%C3%ADdica/0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config file too large: {0}")]
    TooLarge(String),

    #[error("invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to the production constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-request timeout, every tier
    pub request_timeout_secs: u64,
    /// Overall ceiling for the parallel proxy race
    pub race_timeout_secs: u64,
    /// Automatic whole-pipeline retries per cycle
    pub max_retries: u32,
    /// Scheduled refresh period
    pub refresh_interval_minutes: u64,
    /// Maximum items rendered per widget
    pub display_limit: usize,
    /// Relay mirror prefixes, in priority order
    pub proxies: Vec<String>,
    /// Sources to watch
    pub feeds: Vec<FeedSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout_secs: 8,
            race_timeout_secs: 10,
            max_retries: 2,
            refresh_interval_minutes: 30,
            display_limit: 12,
            proxies: default_proxies()
                .iter()
                .map(|p| p.prefix().to_string())
                .collect(),
            feeds: vec![
                FeedSource {
                    name: "stj".to_string(),
                    url: STJ_RSS_URL.to_string(),
                    kind: ContentKind::Rss,
                    try_direct: true,
                },
                FeedSource {
                    name: "trt".to_string(),
                    url: TRT_NEWS_URL.to_string(),
                    kind: ContentKind::Html,
                    try_direct: false,
                },
            ],
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Any feed or proxy URL that fails the public-http policy →
    ///   `Err(ConfigError::InvalidUrl)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            proxies = config.proxies.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for feed in &self.feeds {
            ensure_public_http_url(&feed.url)
                .map_err(|e| ConfigError::InvalidUrl(format!("feed '{}': {e}", feed.name)))?;
        }
        for prefix in &self.proxies {
            ensure_public_http_url(prefix)
                .map_err(|e| ConfigError::InvalidUrl(format!("proxy '{prefix}': {e}")))?;
        }
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            race_timeout: Duration::from_secs(self.race_timeout_secs),
            ..FetchConfig::default()
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            max_retries: self.max_retries,
            refresh_interval: Duration::from_secs(self.refresh_interval_minutes * 60),
            display_limit: self.display_limit,
            ..WatcherConfig::default()
        }
    }

    pub fn proxy_endpoints(&self) -> Vec<ProxyEndpoint> {
        self.proxies
            .iter()
            .map(|prefix| ProxyEndpoint::new(prefix.as_str()))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

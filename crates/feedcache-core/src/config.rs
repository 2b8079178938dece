//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! which repository feed to mirror, the API base URLs, and the limits used by
//! the feed refresher and the category merger.
//!
//! Configuration is stored at `~/.config/feedcache/config.json`. Every field
//! has a default, so a partial file is valid.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::feed::DEFAULT_HISTORY_LIMIT;
use crate::merger::{DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_CONCURRENT};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "feedcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `owner/name` of the repository whose activity feed is mirrored
    pub feed_repo: String,
    pub github_api_url: String,
    pub eonet_api_url: String,
    /// Maximum number of feed events kept on disk
    pub feed_history_limit: usize,
    /// `days` query parameter for per-category event fetches
    pub event_lookback_days: u32,
    /// Category event fetches allowed in flight at once
    pub max_concurrent_category_fetches: usize,
    pub request_timeout_secs: u64,
    /// Overrides the platform cache directory when set
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_repo: "ReactiveX/RxSwift".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            eonet_api_url: "https://eonet.sci.gsfc.nasa.gov/api/v2.1".to_string(),
            feed_history_limit: DEFAULT_HISTORY_LIMIT,
            event_lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_concurrent_category_fetches: DEFAULT_MAX_CONCURRENT,
            request_timeout_secs: 30,
            cache_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Events endpoint of the configured repository
    pub fn feed_url(&self) -> String {
        format!(
            "{}/repos/{}/events",
            self.github_api_url.trim_end_matches('/'),
            self.feed_repo
        )
    }
}

//! Engine configuration management.
//!
//! Configuration covers the remote API origin, the origin the application
//! shell is served from, the versioned cache store names and the shell asset
//! manifest primed at install time.
//!
//! Configuration is stored at `~/.config/storysync/config.json`. Environment
//! variables `STORYSYNC_API_BASE_URL` and `STORYSYNC_APP_BASE_URL` take
//! precedence over the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::PushSubscriptionRecord;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "storysync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "https://story-api.dicoding.dev";
const DEFAULT_APP_BASE_URL: &str = "http://localhost:8080";

/// Store names are versioned; bumping either one retires the old store at
/// the next activation.
const DEFAULT_SHELL_CACHE: &str = "storysync-shell-v1";
const DEFAULT_DATA_CACHE: &str = "storysync-data-v1";

const DEFAULT_SHELL_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/styles.css",
    "/manifest.json",
    "/offline.html",
    "/icons/android-chrome-192x192.png",
    "/icons/android-chrome-512x512.png",
    "/screenshots/screenshoot-dashboard.png",
    "/screenshots/screenshoot-upload.png",
    "/screenshots/screenshoot-dekstop.png",
];

pub const ENV_API_BASE_URL: &str = "STORYSYNC_API_BASE_URL";
pub const ENV_APP_BASE_URL: &str = "STORYSYNC_APP_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub app_base_url: String,
    pub shell_cache: String,
    pub data_cache: String,
    pub shell_assets: Vec<String>,
    /// Subscription handed out by the host's push adapter, when it has one.
    pub push_subscription: Option<PushSubscriptionRecord>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
            shell_cache: DEFAULT_SHELL_CACHE.to_string(),
            data_cache: DEFAULT_DATA_CACHE.to_string(),
            shell_assets: DEFAULT_SHELL_ASSETS.iter().map(|s| s.to_string()).collect(),
            push_subscription: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
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

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_APP_BASE_URL).filter(|v| !v.is_empty()) {
            self.app_base_url = url;
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding one file per named cache store.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("caches"))
    }

    /// Directory holding durable engine state (outbox, push state).
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn outbox_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("outbox.db"))
    }
}

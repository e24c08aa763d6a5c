use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_SYNC_CONFIG: &str = include_str!("data/sync_config.json");

pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Runtime options of the sync engine. Field names match the JSON config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub inventory_file: Option<PathBuf>,
    pub nocases_path: PathBuf,
    pub ws_enabled: bool,
    pub ws_immediately: bool,
    pub ws_cooldown_secs: i64,
    pub ws_url_print_format: String,
    pub wslogin_enabled: bool,
    pub spray_enabled: bool,
    pub spray_cooldown_secs: i64,
    pub stattrak_ignore_bots: bool,
    pub fallback_team: bool,
    pub roundwin_enabled: bool,
    pub roundwin_chance: f64,
    /// Comma-separated reward item ids, oldest first.
    pub roundwin_cases: String,
    pub roundwin_weight: f64,
    pub chat_prefix: String,
    pub autoreload_enabled: bool,
    pub autoreload_interval_secs: u64,
    pub poll_interval_secs: f64,
    pub poll_max_per_tick: usize,
    pub broadcast_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: "https://inventory.cstrike.app".to_string(),
            api_key: None,
            inventory_file: None,
            nocases_path: PathBuf::from("configs/invsim/nocases_steamids.json"),
            ws_enabled: false,
            ws_immediately: false,
            ws_cooldown_secs: 30,
            ws_url_print_format: "{Host}".to_string(),
            wslogin_enabled: false,
            spray_enabled: true,
            spray_cooldown_secs: 30,
            stattrak_ignore_bots: true,
            fallback_team: false,
            roundwin_enabled: false,
            roundwin_chance: 0.5,
            roundwin_cases: String::new(),
            roundwin_weight: 2.0,
            chat_prefix: "- + InventorySimulator + -".to_string(),
            autoreload_enabled: false,
            autoreload_interval_secs: 15,
            poll_interval_secs: 5.0,
            poll_max_per_tick: 4,
            broadcast_interval_ms: 100,
            request_timeout_secs: 10,
        }
    }
}

impl SyncConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_SYNC_CONFIG).expect("builtin sync config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, SyncConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| SyncConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = SyncConfig::from_json_str(&contents)?;
        Ok(config)
    }

    /// API key, with an empty string treated as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        if !self.poll_interval_secs.is_finite() {
            return Duration::from_secs(1);
        }
        Duration::try_from_secs_f64(self.poll_interval_secs.max(1.0))
            .unwrap_or(MAX_INTERVAL)
            .min(MAX_INTERVAL)
    }

    pub fn autoreload_interval(&self) -> Duration {
        Duration::from_secs(self.autoreload_interval_secs.max(1)).min(MAX_INTERVAL)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms.max(10)).min(MAX_INTERVAL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_batch_size(&self) -> usize {
        self.poll_max_per_tick.max(1)
    }

    /// Reward ids parsed from `roundwin_cases`. Blank, non-numeric and
    /// non-positive entries are skipped.
    pub fn reward_ids(&self) -> Vec<u32> {
        self.roundwin_cases
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| entry.parse::<u32>().ok())
            .filter(|id| *id > 0)
            .collect()
    }

    /// Inventory site address rendered through `ws_url_print_format`.
    pub fn announce_url(&self) -> String {
        let host = reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone());
        self.ws_url_print_format
            .replace("{Host}", &host)
            .replace("{Url}", &self.url)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Error)]
pub enum SyncConfigError {
    #[error("failed to parse sync config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read sync config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load the config named by `INVSIM_CONFIG_PATH`, falling back to the
/// builtin defaults when it is unset or unreadable.
pub fn load_sync_config_from_env() -> Arc<SyncConfig> {
    let Some(path) = env::var("INVSIM_CONFIG_PATH").ok().map(PathBuf::from) else {
        return SyncConfig::builtin();
    };

    match SyncConfig::from_file(&path) {
        Ok(config) => Arc::new(config),
        Err(err) => {
            tracing::warn!(
                target: "invsim::config",
                path = %path.display(),
                error = %err,
                "sync_config.load_failed"
            );
            SyncConfig::builtin()
        }
    }
}

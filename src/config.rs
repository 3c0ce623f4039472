//! Application configuration

use std::path::{Path, PathBuf};

use action_flow::CycleConfig;
use anyhow::{Context, Result};
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use stealth::DelayRange;
use tokio::fs;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_INBOX_URL: &str = "https://www.instagram.com/direct/inbox/";
pub const DEFAULT_WORKER_MARKER: &str = "dmsweep=worker";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inbox_url: String,
    /// Query pair appended to the inbox URL to tag the worker surface
    pub worker_marker: String,
    pub state_file: PathBuf,
    pub labels_file: Option<PathBuf>,
    pub speed_bundle_file: Option<PathBuf>,
    pub browser: CdpConfig,
    pub worker: WorkerTimings,
    pub bridge: BridgeSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inbox_url: DEFAULT_INBOX_URL.to_string(),
            worker_marker: DEFAULT_WORKER_MARKER.to_string(),
            state_file: default_state_file(),
            labels_file: None,
            speed_bundle_file: None,
            browser: CdpConfig::default(),
            worker: WorkerTimings::default(),
            bridge: BridgeSettings::default(),
        }
    }
}

impl Config {
    /// Inbox URL with the worker marker appended to its query.
    pub fn worker_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.inbox_url)
            .with_context(|| format!("Invalid inbox_url {}", self.inbox_url))?;
        let (key, value) = self
            .worker_marker
            .split_once('=')
            .unwrap_or((self.worker_marker.as_str(), ""));
        url.query_pairs_mut().append_pair(key, value);
        Ok(url.into())
    }
}

fn default_state_file() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("dmsweep");
    path.push("state.json");
    path
}

/// Path of an absolute URL, without a trailing slash. `None` when it does not parse.
pub fn url_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(parsed.path().trim_end_matches('/').to_string())
}

/// Whether `url` sits at `base_path` or below it.
pub fn is_under_path(url: &str, base_path: &str) -> Option<bool> {
    let path = url_path(url)?;
    Some(
        path == base_path
            || path
                .strip_prefix(base_path)
                .is_some_and(|rest| rest.starts_with('/')),
    )
}

/// Worker loop timings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerTimings {
    pub load_settle_ms: u64,
    pub entry_settle: DelayRange,
    pub pause_poll: DelayRange,
    pub zero_recheck: DelayRange,
    pub failure_retry: DelayRange,
    pub failure_threshold: u32,
    /// Teardown delay after the run completes
    pub completion_grace_ms: u64,
    pub cycle: CycleConfig,
}

impl Default for WorkerTimings {
    fn default() -> Self {
        Self {
            load_settle_ms: 2500,
            entry_settle: DelayRange::new(1000, 1500),
            pause_poll: DelayRange::new(500, 800),
            zero_recheck: DelayRange::new(1500, 2000),
            failure_retry: DelayRange::new(1500, 2500),
            failure_threshold: 5,
            completion_grace_ms: 2000,
            cycle: CycleConfig::default(),
        }
    }
}

/// In-page bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Estimate the initial total from the inbox listing instead of visible rows
    pub hybrid_total: bool,
    pub request_timeout_ms: u64,
    pub max_inbox_pages: u32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            hybrid_total: false,
            request_timeout_ms: 15_000,
            max_inbox_pages: 10,
        }
    }
}

impl BridgeSettings {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => {
            // Priority: ./config/config.yaml > ~/.config/dmsweep/config.yaml
            let local_config = PathBuf::from("config/config.yaml");
            if local_config.exists() {
                local_config
            } else {
                let mut path = dirs::config_dir().context("Failed to get config directory")?;
                path.push("dmsweep");
                path.push("config.yaml");
                path
            }
        }
    };

    if config_path.exists() {
        let config = read_config_file(&config_path).await?;
        info!("Loaded configuration from: {}", config_path.display());
        Ok(LoadedConfig {
            config,
            path: config_path,
        })
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        Ok(LoadedConfig {
            config: Config::default(),
            path: config_path,
        })
    }
}

async fn read_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::Source;
use crate::orchestrator::{ConcurrencyLimits, RefreshMode};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// JSON snapshot of the store.  No persistence when unset.
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default, rename = "feed")]
    pub feeds: Vec<FeedConfig>,
}

fn default_log_level() -> String {
    "feed_refresh=info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_interactive")]
    pub interactive_concurrency: usize,
    #[serde(default = "default_warm_up")]
    pub warm_up_concurrency: usize,
    #[serde(default = "default_time_boxed")]
    pub time_boxed_concurrency: usize,
    #[serde(default = "default_deadline")]
    pub time_boxed_deadline_secs: u64,
    pub time_boxed_max_sources: Option<usize>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
}

fn default_interactive() -> usize { 8 }
fn default_warm_up() -> usize { 6 }
fn default_time_boxed() -> usize { 2 }
fn default_deadline() -> u64 { 25 }
fn default_fetch_timeout() -> u64 { 15 }
fn default_watch_interval() -> u64 { 900 }

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interactive_concurrency: default_interactive(),
            warm_up_concurrency: default_warm_up(),
            time_boxed_concurrency: default_time_boxed(),
            time_boxed_deadline_secs: default_deadline(),
            time_boxed_max_sources: None,
            fetch_timeout_secs: default_fetch_timeout(),
            watch_interval_secs: default_watch_interval(),
        }
    }
}

impl RefreshConfig {
    /// Ceilings per mode, each at least 1.
    pub fn limits(&self) -> ConcurrencyLimits {
        ConcurrencyLimits {
            interactive: self.interactive_concurrency.max(1),
            warm_up: self.warm_up_concurrency.max(1),
            time_boxed: self.time_boxed_concurrency.max(1),
        }
    }

    pub fn time_boxed_mode(&self) -> RefreshMode {
        RefreshMode::TimeBoxed {
            deadline: Duration::from_secs(self.time_boxed_deadline_secs),
            max_sources: self.time_boxed_max_sources,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Stable identifier; the address is used when omitted.
    pub id: Option<String>,
    pub label: String,
    pub address: String,
    #[serde(default)]
    pub prioritized: bool,
}

impl FeedConfig {
    pub fn to_source(&self) -> Source {
        let id = self.id.clone().unwrap_or_else(|| self.address.clone());
        Source::new(id, self.label.clone(), self.address.clone()).prioritized(self.prioritized)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse config TOML")
    }
}

// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::feed::http::DEFAULT_BASE_URL;
use crate::scheduler::SchedulerCfg;
use crate::session::SinkCfg;

pub const ENV_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/relay.toml";

fn default_feed_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_initial_batch() -> usize {
    10
}
fn default_max_new_per_tick() -> usize {
    5
}
fn default_poll_interval_secs() -> u64 {
    120
}
fn default_write_timeout_secs() -> u64 {
    5
}
fn default_channel_capacity() -> usize {
    32
}
fn default_stats_interval_secs() -> u64 {
    2
}
fn default_ui_dir() -> String {
    "ui".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Stories sent to a new client before delta tracking starts.
    #[serde(default = "default_initial_batch")]
    pub initial_batch: usize,
    #[serde(default = "default_max_new_per_tick")]
    pub max_new_per_tick: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    #[serde(default = "default_ui_dir")]
    pub ui_dir: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            feed_base_url: default_feed_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            initial_batch: default_initial_batch(),
            max_new_per_tick: default_max_new_per_tick(),
            poll_interval_secs: default_poll_interval_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            channel_capacity: default_channel_capacity(),
            stats_interval_secs: default_stats_interval_secs(),
            ui_dir: default_ui_dir(),
        }
    }
}

impl RelayConfig {
    /// Load from an explicit TOML file, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading relay config from {}", path.display()))?;
        let cfg: RelayConfig = toml::from_str(&content)
            .with_context(|| format!("parsing relay config {}", path.display()))?;
        Ok(cfg.with_env_overrides().sanitized())
    }

    /// Resolve the config file:
    /// 1) $RELAY_CONFIG_PATH
    /// 2) config/relay.toml
    /// 3) built-in defaults
    ///
    /// Env overrides (`RELAY_*`) apply in every case.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default().with_env_overrides().sanitized())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("RELAY_FEED_BASE_URL") {
            if !v.trim().is_empty() {
                self.feed_base_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("RELAY_UI_DIR") {
            if !v.trim().is_empty() {
                self.ui_dir = v.trim().to_string();
            }
        }
        override_num("RELAY_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        override_num("RELAY_INITIAL_BATCH", &mut self.initial_batch);
        override_num("RELAY_MAX_NEW_PER_TICK", &mut self.max_new_per_tick);
        override_num("RELAY_POLL_INTERVAL_SECS", &mut self.poll_interval_secs);
        override_num("RELAY_WRITE_TIMEOUT_SECS", &mut self.write_timeout_secs);
        override_num("RELAY_STATS_INTERVAL_SECS", &mut self.stats_interval_secs);
        self
    }

    /// Zero durations and capacities would stall or spin; fall back to defaults.
    fn sanitized(mut self) -> Self {
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = default_poll_interval_secs();
        }
        if self.write_timeout_secs == 0 {
            self.write_timeout_secs = default_write_timeout_secs();
        }
        if self.channel_capacity == 0 {
            self.channel_capacity = default_channel_capacity();
        }
        if self.stats_interval_secs == 0 {
            self.stats_interval_secs = default_stats_interval_secs();
        }
        self
    }

    pub fn scheduler(&self) -> SchedulerCfg {
        SchedulerCfg {
            initial_batch: self.initial_batch,
            max_new_per_tick: self.max_new_per_tick,
            interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    pub fn sink(&self) -> SinkCfg {
        SinkCfg {
            capacity: self.channel_capacity,
            write_timeout: Duration::from_secs(self.write_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

fn override_num<T: std::str::FromStr>(var: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(var, value = %raw, "ignoring unparsable env override"),
    }
}

// src/config/mod.rs
//! Harvester configuration: TOML file plus env overrides.
//!
//! Lookup order for the file:
//! 1) $HARVESTER_CONFIG_PATH
//! 2) config/harvester.toml
//! 3) built-in defaults

pub mod rules;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::convergence::ConvergencePolicy;
use crate::fetch::FeedKind;
use crate::store::StoreSettings;

pub use rules::{ChannelConfig, RuleConfig};

const ENV_PATH: &str = "HARVESTER_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/harvester.toml";

fn default_page_size() -> usize {
    50
}
fn default_initial_target() -> usize {
    10_000
}
fn default_refresh_secs() -> u64 {
    60
}
fn default_pause_count() -> u32 {
    3
}
fn default_persist_secs() -> u64 {
    60
}
fn default_state_path() -> PathBuf {
    PathBuf::from("state/collector.json")
}
fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_http_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: FeedKind,
    /// URL template with `{page}` and `{page_size}`; defaults per feed kind.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: FeedKind::Futu,
            url: None,
        }
    }
}

impl SourceConfig {
    pub fn url_template(&self) -> &str {
        self.url.as_deref().unwrap_or_else(|| self.kind.default_url())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_initial_target")]
    pub initial_target_count: usize,
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_pause_count")]
    pub pause_count: u32,
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Resume the backfill whenever fewer than `initial_target_count` messages are stored.
    #[serde(default)]
    pub look_back: bool,
    #[serde(default = "default_true")]
    pub alert_on_backfill: bool,
    #[serde(default = "default_persist_secs")]
    pub persist_interval_secs: u64,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub channels: std::collections::BTreeMap<String, ChannelConfig>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            page_size: default_page_size(),
            initial_target_count: default_initial_target(),
            refresh_interval_secs: default_refresh_secs(),
            pause_count: default_pause_count(),
            max_pages: None,
            look_back: false,
            alert_on_backfill: true,
            persist_interval_secs: default_persist_secs(),
            state_path: default_state_path(),
            bind_addr: default_bind_addr(),
            http_timeout_secs: default_http_timeout(),
            channels: Default::default(),
            rules: Vec::new(),
        }
    }
}

impl CollectorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: CollectorConfig = toml::from_str(s).context("parsing harvester config")?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading harvester config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// File per the lookup order, then env overrides, then validation.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_PATH))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `LOOK_BACK`, `PAGE_SIZE`, `INITIAL_TARGET_COUNT`, `REFRESH_INTERVAL_SECS`, `STATE_PATH`, `BIND_ADDR`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_nonempty("LOOK_BACK") {
            self.look_back = parse_bool(&v).ok_or_else(|| anyhow!("LOOK_BACK must be a boolean, got `{v}`"))?;
        }
        if let Some(v) = env_nonempty("PAGE_SIZE") {
            self.page_size = v.parse().with_context(|| format!("PAGE_SIZE `{v}`"))?;
        }
        if let Some(v) = env_nonempty("INITIAL_TARGET_COUNT") {
            self.initial_target_count = v.parse().with_context(|| format!("INITIAL_TARGET_COUNT `{v}`"))?;
        }
        if let Some(v) = env_nonempty("REFRESH_INTERVAL_SECS") {
            self.refresh_interval_secs = v.parse().with_context(|| format!("REFRESH_INTERVAL_SECS `{v}`"))?;
        }
        if let Some(v) = env_nonempty("STATE_PATH") {
            self.state_path = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty("BIND_ADDR") {
            self.bind_addr = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.pause_count == 0 {
            bail!("pause_count must be at least 1");
        }
        if self.refresh_interval_secs == 0 || self.persist_interval_secs == 0 {
            bail!("intervals must be at least one second");
        }
        if self.max_pages == Some(0) {
            bail!("max_pages must be at least 1 when set");
        }
        for rule in &self.rules {
            rule.validate(&self.channels)?;
        }
        Ok(())
    }

    pub fn policy(&self) -> ConvergencePolicy {
        ConvergencePolicy {
            page_size: self.page_size,
            initial_target_count: self.initial_target_count,
            pause_count: self.pause_count,
            max_pages: self.max_pages,
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            initial_target_count: self.initial_target_count,
            page_size: self.page_size,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

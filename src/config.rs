//! Shop configuration and its cache.
//!
//! The cache is an explicit object owned by the composition root with a time
//! box and an invalidate/refresh surface. There is deliberately no
//! module-level singleton: whoever builds the workflow context decides when
//! config is reread.

use crate::desk::DeskPaths;
use crate::signature;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{Duration, Instant};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

const DEFAULT_REPORT_MAX_BYTES: u64 = 2 * 1024 * 1024;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub schema_version: u32,
    /// Base URL every collaborator endpoint hangs off.
    pub base_url: String,
    #[serde(default = "default_report_max_bytes")]
    pub report_max_bytes: u64,
    #[serde(default = "default_report_extensions")]
    pub report_extensions: Vec<String>,
    #[serde(default = "default_raster_width")]
    pub raster_width: usize,
    #[serde(default = "default_raster_height")]
    pub raster_height: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_report_max_bytes() -> u64 {
    DEFAULT_REPORT_MAX_BYTES
}

fn default_report_extensions() -> Vec<String> {
    vec!["xml".to_string(), "hws".to_string()]
}

fn default_raster_width() -> usize {
    signature::DEFAULT_WIDTH
}

fn default_raster_height() -> usize {
    signature::DEFAULT_HEIGHT
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

pub fn default_config(base_url: &str) -> ShopConfig {
    ShopConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        base_url: base_url.trim_end_matches('/').to_string(),
        report_max_bytes: default_report_max_bytes(),
        report_extensions: default_report_extensions(),
        raster_width: default_raster_width(),
        raster_height: default_raster_height(),
        cache_ttl_secs: default_cache_ttl_secs(),
    }
}

pub fn write_config(paths: &DeskPaths, config: &ShopConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("serialize config")?;
    fs::write(paths.config_path(), json)
        .with_context(|| format!("write config {}", paths.config_path().display()))?;
    Ok(())
}

pub fn load_config(paths: &DeskPaths) -> Result<ShopConfig> {
    let config_path = paths.config_path();
    if !config_path.is_file() {
        return Err(anyhow!(
            "desk is not initialized (run `rdesk init` first)"
        ));
    }
    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("read config {}", config_path.display()))?;
    let config: ShopConfig = serde_json::from_str(&content)
        .with_context(|| format!("parse config {}", config_path.display()))?;
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "config schema version {} is not supported (expected {CONFIG_SCHEMA_VERSION})",
            config.schema_version
        ));
    }
    Ok(config)
}

/// Time-boxed config holder. `get` rereads the file once the TTL lapses;
/// `invalidate` forces the next `get` to reread.
pub struct ConfigCache {
    paths: DeskPaths,
    slot: Option<(Instant, ShopConfig)>,
}

impl ConfigCache {
    pub fn new(paths: DeskPaths) -> ConfigCache {
        ConfigCache { paths, slot: None }
    }

    pub fn get(&mut self) -> Result<&ShopConfig> {
        let stale = match &self.slot {
            Some((loaded_at, config)) => {
                loaded_at.elapsed() > Duration::from_secs(config.cache_ttl_secs)
            }
            None => true,
        };
        if stale {
            self.refresh()?;
        }
        match &self.slot {
            Some((_, config)) => Ok(config),
            None => Err(anyhow!("config cache refresh left no value")),
        }
    }

    pub fn refresh(&mut self) -> Result<&ShopConfig> {
        tracing::debug!("refreshing shop config from disk");
        let config = load_config(&self.paths)?;
        self.slot = Some((Instant::now(), config));
        match &self.slot {
            Some((_, config)) => Ok(config),
            None => Err(anyhow!("config cache refresh left no value")),
        }
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }
}

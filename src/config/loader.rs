use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{Context, Result};
use crate::fetch::PayloadFormat;
use crate::records::{RegionId, StationId, SystemId};

use super::{
    validator, EndpointConfig, HarvestConfig, HttpSettings, PipelineSettings,
    DEFAULT_CYCLE_INTERVAL_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_ORDER_PAGES,
    DEFAULT_STAT_SYSTEM, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, DEFAULT_WORKERS,
};

/// Load `assets/configs/harvest.json` below the given root.
pub fn load_default_config(root: &Path) -> Result<HarvestConfig> {
    let path = root.join("assets").join("configs").join("harvest.json");
    load_config(&path)
}

/// Parse and validate a harvester config file.
pub fn load_config(path: &Path) -> Result<HarvestConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read harvest config JSON at {}", path.display()))?;

    let config = parse_config(&json)
        .with_context(|| format!("failed to load harvest config at {}", path.display()))?;

    Ok(config)
}

pub fn parse_config(json: &str) -> Result<HarvestConfig> {
    let raw: RawHarvestConfig = serde_json::from_str(json)?;
    let config = raw.into_config();
    validator::validate_config(&config)?;
    Ok(config)
}

#[derive(Debug, Deserialize)]
struct RawHarvestConfig {
    #[serde(default)]
    regions: Vec<RegionId>,
    #[serde(default)]
    hub_stations: Vec<StationId>,
    endpoints: RawEndpoints,
    #[serde(default)]
    marketstat: RawMarketStat,
    #[serde(default)]
    http: RawHttp,
    #[serde(default)]
    pipeline: RawPipeline,
    #[serde(default)]
    storage: RawStorage,
}

#[derive(Debug, Deserialize)]
struct RawEndpoints {
    history: String,
    orders: String,
    #[serde(default)]
    marketstat: Option<String>,
    #[serde(default)]
    format: PayloadFormat,
}

#[derive(Debug, Deserialize)]
struct RawMarketStat {
    #[serde(default = "default_stat_system")]
    system_id: SystemId,
}

impl Default for RawMarketStat {
    fn default() -> Self {
        Self {
            system_id: DEFAULT_STAT_SYSTEM,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawHttp {
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default)]
    retry_backoff_ms: u64,
    #[serde(default)]
    user_agent: Option<String>,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff_ms: 0,
            user_agent: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPipeline {
    #[serde(default = "default_workers")]
    workers: usize,
    #[serde(default = "default_cycle_interval_secs")]
    cycle_interval_secs: u64,
    #[serde(default = "default_max_order_pages")]
    max_order_pages: u32,
}

impl Default for RawPipeline {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            cycle_interval_secs: DEFAULT_CYCLE_INTERVAL_SECS,
            max_order_pages: DEFAULT_MAX_ORDER_PAGES,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    #[serde(default = "default_database_path")]
    path: PathBuf,
}

impl Default for RawStorage {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl RawHarvestConfig {
    fn into_config(self) -> HarvestConfig {
        let mut regions = self.regions;
        regions.sort_unstable();
        regions.dedup();

        HarvestConfig {
            regions,
            hub_stations: self.hub_stations,
            endpoints: EndpointConfig {
                history: self.endpoints.history.trim().to_string(),
                orders: self.endpoints.orders.trim().to_string(),
                marketstat: self
                    .endpoints
                    .marketstat
                    .map(|url| url.trim().to_string())
                    .filter(|url| !url.is_empty()),
                format: self.endpoints.format,
            },
            stat_system: self.marketstat.system_id,
            http: HttpSettings {
                timeout: Duration::from_secs(self.http.timeout_secs),
                max_attempts: self.http.max_attempts,
                retry_backoff: Duration::from_millis(self.http.retry_backoff_ms),
                user_agent: self
                    .http
                    .user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            },
            pipeline: PipelineSettings {
                workers: self.pipeline.workers,
                cycle_interval: Duration::from_secs(self.pipeline.cycle_interval_secs),
                max_order_pages: self.pipeline.max_order_pages,
            },
            database_path: self.storage.path,
        }
    }
}

fn default_stat_system() -> SystemId {
    DEFAULT_STAT_SYSTEM
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_cycle_interval_secs() -> u64 {
    DEFAULT_CYCLE_INTERVAL_SECS
}

fn default_max_order_pages() -> u32 {
    DEFAULT_MAX_ORDER_PAGES
}

fn default_database_path() -> PathBuf {
    PathBuf::from("eve_market.db")
}

use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::PayloadFormat;
use crate::records::{RegionId, StationId, SystemId};

pub mod loader;
pub mod validator;

pub use loader::{load_config, load_default_config};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_WORKERS: usize = 25;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_MAX_ORDER_PAGES: u32 = 500;
pub const DEFAULT_STAT_SYSTEM: SystemId = 30000142;
pub const DEFAULT_USER_AGENT: &str = concat!("eve-harvest/", env!("CARGO_PKG_VERSION"));

/// URL templates for the upstream market API.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Placeholders: `{region}`, `{type_id}`.
    pub history: String,
    /// Placeholders: `{region}`, `{page}`.
    pub orders: String,
    pub marketstat: Option<String>,
    /// Wire format served by the history and orders endpoints.
    pub format: PayloadFormat,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::ZERO,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub workers: usize,
    pub cycle_interval: Duration,
    pub max_order_pages: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            cycle_interval: Duration::from_secs(DEFAULT_CYCLE_INTERVAL_SECS),
            max_order_pages: DEFAULT_MAX_ORDER_PAGES,
        }
    }
}

/// Fully resolved harvester configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub regions: Vec<RegionId>,
    /// Trade hubs whose regions are added to `regions` once reference data is loaded.
    pub hub_stations: Vec<StationId>,
    pub endpoints: EndpointConfig,
    pub stat_system: SystemId,
    pub http: HttpSettings,
    pub pipeline: PipelineSettings,
    pub database_path: PathBuf,
}

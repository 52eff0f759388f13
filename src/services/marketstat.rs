use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;

use crate::error::Result;
use crate::fetch::{decode_marketstat, request::marketstat_urls};
use crate::records::SystemId;
use crate::storage::MarketStore;

use super::coordinator::{FetchCoordinator, FetchJob};
use super::SyncReport;

/// Polls the aggregated quick-look feed for all marketable types in one
/// solar system, batching type ids per request.
pub struct MarketStatSync {
    store: Arc<dyn MarketStore>,
    coordinator: FetchCoordinator,
    base_url: String,
    system_id: SystemId,
}

impl MarketStatSync {
    pub fn new(
        store: Arc<dyn MarketStore>,
        coordinator: FetchCoordinator,
        base_url: impl Into<String>,
        system_id: SystemId,
    ) -> Self {
        Self {
            store,
            coordinator,
            base_url: base_url.into(),
            system_id,
        }
    }

    pub async fn run_once(&self, fetched_at: DateTime<Utc>) -> Result<SyncReport> {
        let type_ids = self.store.marketable_type_ids()?;
        let jobs: Vec<FetchJob<usize, _>> = marketstat_urls(&self.base_url, &type_ids, self.system_id)
            .into_iter()
            .enumerate()
            .map(|(batch, url)| FetchJob::new(batch, url))
            .collect();

        let system_id = self.system_id;
        let results = self
            .coordinator
            .run(jobs, move |_: &usize, body: &[u8]| decode_marketstat(body, system_id))
            .await;

        let mut report = SyncReport {
            jobs: results.len(),
            succeeded: results.succeeded_count(),
            failed: results.failed_count(),
            rows_written: 0,
        };

        let stats: Vec<_> = results
            .into_succeeded()
            .into_iter()
            .flat_map(FetchJob::into_records)
            .collect();
        report.rows_written = self.store.insert_market_stats(&stats, fetched_at)?;

        info!(
            "quick-look stats for system {}: {} batch(es), {} failed, {} row(s) written",
            self.system_id, report.jobs, report.failed, report.rows_written
        );
        Ok(report)
    }
}

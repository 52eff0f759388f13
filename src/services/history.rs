use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info};

use crate::error::Result;
use crate::fetch::{decode_history, request::history_url, PayloadFormat};
use crate::records::{HistoryKey, HistoryRecord, RegionId, TypeId};
use crate::storage::MarketStore;

use super::coordinator::{FetchCoordinator, FetchJob};
use super::planner::plan;
use super::SyncReport;

/// Pulls daily history for every marketable type in the watched regions and
/// writes only the days storage does not hold yet.
pub struct HistorySync {
    store: Arc<dyn MarketStore>,
    coordinator: FetchCoordinator,
    template: String,
    format: PayloadFormat,
}

impl HistorySync {
    pub fn new(
        store: Arc<dyn MarketStore>,
        coordinator: FetchCoordinator,
        template: impl Into<String>,
        format: PayloadFormat,
    ) -> Self {
        Self {
            store,
            coordinator,
            template: template.into(),
            format,
        }
    }

    /// Regions are drained and persisted one after another, so only one
    /// region's history windows are held in memory at a time.
    pub async fn run_cycle(&self, regions: &[RegionId], today: NaiveDate) -> Result<SyncReport> {
        let type_ids = self.store.marketable_type_ids()?;
        info!(
            "history cycle: {} region(s) x {} type(s)",
            regions.len(),
            type_ids.len()
        );

        let mut report = SyncReport::default();
        for &region_id in regions {
            let region = self.run_region(region_id, &type_ids, today).await?;
            report.jobs += region.jobs;
            report.succeeded += region.succeeded;
            report.failed += region.failed;
            report.rows_written += region.rows_written;
        }

        info!(
            "history cycle finished: {} succeeded, {} failed, {} row(s) written",
            report.succeeded, report.failed, report.rows_written
        );
        Ok(report)
    }

    async fn run_region(
        &self,
        region_id: RegionId,
        type_ids: &[TypeId],
        today: NaiveDate,
    ) -> Result<SyncReport> {
        let mut jobs = Vec::with_capacity(type_ids.len());
        for &type_id in type_ids {
            let url = history_url(&self.template, region_id, type_id)?;
            jobs.push(FetchJob::new(HistoryKey { region_id, type_id }, url));
        }

        let format = self.format;
        let results = self
            .coordinator
            .run(jobs, move |key: &HistoryKey, body: &[u8]| {
                decode_history(body, format, key.type_id, key.region_id)
            })
            .await;

        let mut report = SyncReport {
            jobs: results.len(),
            succeeded: results.succeeded_count(),
            failed: results.failed_count(),
            rows_written: 0,
        };

        for job in results.into_succeeded() {
            let key = job.key;
            report.rows_written += self.persist(key, today, job.into_records())?;
        }

        debug!(
            "region {region_id}: {} history job(s), {} row(s) written",
            report.jobs, report.rows_written
        );
        Ok(report)
    }

    fn persist(&self, key: HistoryKey, today: NaiveDate, fresh: Vec<HistoryRecord>) -> Result<usize> {
        let age = self
            .store
            .days_since_last_history(key.type_id, key.region_id, today)?;
        let planned = plan(today, age, fresh);
        if planned.is_empty() {
            return Ok(0);
        }

        let written = self.store.insert_history(&planned)?;
        debug!(
            "type {} region {}: planned {}, wrote {}",
            key.type_id,
            key.region_id,
            planned.len(),
            written
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use crate::fetch::client::testing::StubTransport;
    use crate::fetch::{RemoteFetcher, ShutdownSignal};
    use crate::storage::fixtures::{day, history, item};
    use crate::storage::SqliteStore;

    const TEMPLATE: &str = "http://stub/markets/{region}/history/?type_id={type_id}";

    fn history_body(dates: &[&str]) -> String {
        let rows: Vec<String> = dates
            .iter()
            .map(|date| {
                format!(
                    r#"{{"date":"{date}","order_count":120,"lowest":5.0,"highest":5.6,"average":5.3,"volume":900000}}"#
                )
            })
            .collect();
        format!("[{}]", rows.join(","))
    }

    fn sync(store: Arc<SqliteStore>, stub: Arc<StubTransport>) -> HistorySync {
        let fetcher = RemoteFetcher::new(stub, &HttpSettings::default(), ShutdownSignal::never());
        HistorySync::new(
            store,
            FetchCoordinator::new(fetcher, 25),
            TEMPLATE,
            PayloadFormat::Json,
        )
    }

    #[tokio::test]
    async fn writes_only_days_after_stored_history() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.store_items(&[item(34, true)]).unwrap();
        store
            .insert_history(&[history(34, 10000002, day(2024, 1, 10))])
            .unwrap();

        let stub = Arc::new(StubTransport::new());
        stub.serve(
            "http://stub/markets/10000002/history/?type_id=34",
            history_body(&["2024-01-09", "2024-01-10", "2024-01-11", "2024-01-12"]),
        );

        let report = sync(store.clone(), stub)
            .run_cycle(&[10000002], day(2024, 1, 12))
            .await
            .unwrap();

        assert_eq!(report.rows_written, 2);
        assert_eq!(
            store.history_dates(34, 10000002).unwrap(),
            vec![day(2024, 1, 10), day(2024, 1, 11), day(2024, 1, 12)]
        );
    }

    #[tokio::test]
    async fn repeat_cycle_writes_nothing() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.store_items(&[item(34, true), item(35, true)]).unwrap();

        let stub = Arc::new(StubTransport::new());
        for type_id in [34, 35] {
            stub.serve(
                format!("http://stub/markets/10000002/history/?type_id={type_id}"),
                history_body(&["2024-01-10", "2024-01-11", "2024-01-12"]),
            );
        }
        let sync = sync(store.clone(), stub);

        let first = sync.run_cycle(&[10000002], day(2024, 1, 12)).await.unwrap();
        let second = sync.run_cycle(&[10000002], day(2024, 1, 12)).await.unwrap();

        assert_eq!(first.rows_written, 6);
        assert_eq!(second.rows_written, 0);
        assert_eq!(store.history_count().unwrap(), 6);
    }

    /// Serves one day of history and records how many rows were stored
    /// when the first request for a second region arrived.
    struct RegionOrderTransport {
        store: Arc<SqliteStore>,
        rows_before_second_region: parking_lot::Mutex<Option<i64>>,
    }

    #[async_trait::async_trait]
    impl crate::fetch::Transport for RegionOrderTransport {
        async fn get(&self, url: &str) -> crate::fetch::FetchResult<Vec<u8>> {
            if url.contains("/10000043/") {
                let mut seen = self.rows_before_second_region.lock();
                if seen.is_none() {
                    *seen = Some(self.store.history_count()?);
                }
            }
            Ok(history_body(&["2024-01-12"]).into_bytes())
        }
    }

    #[tokio::test]
    async fn each_region_is_persisted_before_the_next_is_fetched() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.store_items(&[item(34, true), item(35, true)]).unwrap();

        let transport = Arc::new(RegionOrderTransport {
            store: store.clone(),
            rows_before_second_region: parking_lot::Mutex::new(None),
        });
        let fetcher = RemoteFetcher::new(
            transport.clone(),
            &HttpSettings::default(),
            ShutdownSignal::never(),
        );
        let sync = HistorySync::new(
            store.clone(),
            FetchCoordinator::new(fetcher, 25),
            TEMPLATE,
            PayloadFormat::Json,
        );

        let report = sync
            .run_cycle(&[10000002, 10000043], day(2024, 1, 12))
            .await
            .unwrap();

        assert_eq!(report.jobs, 4);
        assert_eq!(report.rows_written, 4);
        assert_eq!(*transport.rows_before_second_region.lock(), Some(2));
    }

    #[tokio::test]
    async fn failed_keys_are_skipped() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .store_items(&[item(34, true), item(35, true), item(36, false)])
            .unwrap();

        let stub = Arc::new(StubTransport::new());
        stub.serve(
            "http://stub/markets/10000002/history/?type_id=34",
            history_body(&["2024-01-12"]),
        );
        stub.serve(
            "http://stub/markets/10000002/history/?type_id=35",
            "{\"error\":\"not an array\"}",
        );

        let report = sync(store.clone(), stub.clone())
            .run_cycle(&[10000002], day(2024, 1, 12))
            .await
            .unwrap();

        assert_eq!(report.jobs, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.rows_written, 1);
        assert_eq!(
            stub.calls_for("http://stub/markets/10000002/history/?type_id=36"),
            0
        );
    }
}

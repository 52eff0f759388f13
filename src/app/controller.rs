use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{info, warn};

use crate::config::HarvestConfig;
use crate::error::{AppError, Result};
use crate::fetch::{RemoteFetcher, ShutdownSignal, Transport};
use crate::records::RegionId;
use crate::services::{FetchCoordinator, HistorySync, MarketStatSync, OrderSync, SyncReport};
use crate::storage::MarketStore;
use crate::utils::today_utc;

/// Outcome of one full harvest cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub regions: usize,
    pub orders: SyncReport,
    pub history: SyncReport,
}

/// Drives strictly sequential harvest cycles over the watched regions.
pub struct HarvestController {
    config: HarvestConfig,
    store: Arc<dyn MarketStore>,
    orders: OrderSync,
    history: HistorySync,
    stats: Option<MarketStatSync>,
    shutdown: ShutdownSignal,
}

impl HarvestController {
    pub fn new(
        config: HarvestConfig,
        store: Arc<dyn MarketStore>,
        transport: Arc<dyn Transport>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let fetcher = RemoteFetcher::new(transport, &config.http, shutdown.clone());
        let coordinator = FetchCoordinator::new(fetcher.clone(), config.pipeline.workers);
        let format = config.endpoints.format;

        let orders = OrderSync::new(
            Arc::clone(&store),
            fetcher,
            config.endpoints.orders.clone(),
            format,
            config.pipeline.workers,
            config.pipeline.max_order_pages,
        );
        let history = HistorySync::new(
            Arc::clone(&store),
            coordinator.clone(),
            config.endpoints.history.clone(),
            format,
        );
        let stats = config.endpoints.marketstat.as_ref().map(|base| {
            MarketStatSync::new(
                Arc::clone(&store),
                coordinator.clone(),
                base.clone(),
                config.stat_system,
            )
        });

        Self {
            config,
            store,
            orders,
            history,
            stats,
            shutdown,
        }
    }

    /// Configured regions plus the regions of the configured hub stations.
    pub fn watched_regions(&self) -> Result<Vec<RegionId>> {
        let mut regions = self.config.regions.clone();

        for &station_id in &self.config.hub_stations {
            match self.store.region_of(station_id)? {
                Some(region_id) => regions.push(region_id),
                None => warn!("hub station {station_id} is not in the station table; seed it first"),
            }
        }

        regions.sort_unstable();
        regions.dedup();
        Ok(regions)
    }

    pub async fn run_cycle(&self, today: NaiveDate) -> Result<CycleSummary> {
        let regions = self.watched_regions()?;
        if regions.is_empty() {
            return Err(AppError::message("No regions to harvest"));
        }

        info!("cycle for {today} started over {} region(s)", regions.len());
        let orders = self.orders.run_cycle(&regions).await?;
        let history = self.history.run_cycle(&regions, today).await?;

        let summary = CycleSummary {
            regions: regions.len(),
            orders,
            history,
        };
        info!(
            "cycle for {today} done: orders {}/{} regions ({} rows), history {}/{} jobs ({} rows)",
            orders.succeeded,
            orders.jobs,
            orders.rows_written,
            history.succeeded,
            history.jobs,
            history.rows_written
        );
        Ok(summary)
    }

    /// Run cycles until shutdown, sleeping the configured interval between
    /// them. A storage error ends the loop with that error.
    pub async fn run_forever(&self) -> Result<()> {
        let mut shutdown = self.shutdown.clone();
        let interval = self.config.pipeline.cycle_interval;

        loop {
            if shutdown.is_triggered() {
                break;
            }

            self.run_cycle(today_utc()).await?;

            if shutdown.is_triggered() {
                break;
            }
            info!("next cycle in {}s", interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.triggered() => break,
            }
        }

        info!("harvest loop stopped");
        Ok(())
    }

    pub async fn collect_market_stats(&self) -> Result<SyncReport> {
        let stats = self
            .stats
            .as_ref()
            .ok_or_else(|| AppError::message("endpoints.marketstat is not configured"))?;
        stats.run_once(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{EndpointConfig, HttpSettings, PipelineSettings};
    use crate::fetch::client::testing::StubTransport;
    use crate::fetch::{shutdown_channel, PayloadFormat};
    use crate::storage::fixtures::{day, item, jita};
    use crate::storage::SqliteStore;

    fn config(regions: Vec<RegionId>, interval: Duration) -> HarvestConfig {
        HarvestConfig {
            regions,
            hub_stations: vec![60003760],
            endpoints: EndpointConfig {
                history: "http://stub/{region}/history/{type_id}".to_string(),
                orders: "http://stub/{region}/orders/{page}".to_string(),
                marketstat: None,
                format: PayloadFormat::Json,
            },
            stat_system: 30000142,
            http: HttpSettings {
                max_attempts: 1,
                ..HttpSettings::default()
            },
            pipeline: PipelineSettings {
                workers: 4,
                cycle_interval: interval,
                max_order_pages: 10,
            },
            database_path: ":memory:".into(),
        }
    }

    fn seeded_store() -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.store_items(&[item(34, true)]).unwrap();
        store.store_stations(&[jita()]).unwrap();
        store
    }

    #[test]
    fn hub_stations_add_their_region() {
        let store = seeded_store();
        let controller = HarvestController::new(
            config(vec![10000043], Duration::from_secs(60)),
            store,
            Arc::new(StubTransport::new()),
            ShutdownSignal::never(),
        );

        assert_eq!(controller.watched_regions().unwrap(), vec![10000002, 10000043]);
    }

    #[tokio::test]
    async fn cycle_runs_orders_then_history() {
        let store = seeded_store();
        let stub = Arc::new(StubTransport::new());
        stub.serve(
            "http://stub/10000002/orders/1",
            r#"[{"duration":90,"is_buy_order":true,"issued":"2024-01-12T08:00:00Z","location_id":60003760,"price":5.0,"range":"station","type_id":34,"volume_remain":10}]"#,
        );
        stub.serve("http://stub/10000002/orders/2", "[]");
        stub.serve(
            "http://stub/10000002/history/34",
            r#"[{"date":"2024-01-12","order_count":1,"lowest":5.0,"highest":5.0,"average":5.0,"volume":10}]"#,
        );

        let controller = HarvestController::new(
            config(vec![], Duration::from_secs(60)),
            store.clone(),
            stub,
            ShutdownSignal::never(),
        );

        let summary = controller.run_cycle(day(2024, 1, 12)).await.unwrap();
        assert_eq!(summary.regions, 1);
        assert_eq!(summary.orders.rows_written, 1);
        assert_eq!(summary.history.rows_written, 1);
        assert_eq!(store.order_count(10000002).unwrap(), 1);
        assert_eq!(store.history_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn loop_exits_when_shutdown_fires_during_sleep() {
        let store = seeded_store();
        let stub = Arc::new(StubTransport::new());
        let (trigger, signal) = shutdown_channel();
        let controller = HarvestController::new(
            config(vec![], Duration::from_secs(3600)),
            store,
            stub.clone(),
            signal,
        );

        let handle = tokio::spawn(async move { controller.run_forever().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop stopped promptly")
            .unwrap();
        assert!(result.is_ok());
        assert!(stub.total_calls() >= 2);
    }

    #[tokio::test]
    async fn market_stats_need_an_endpoint() {
        let controller = HarvestController::new(
            config(vec![10000002], Duration::from_secs(60)),
            seeded_store(),
            Arc::new(StubTransport::new()),
            ShutdownSignal::never(),
        );

        let err = controller.collect_market_stats().await.unwrap_err();
        assert!(err.to_string().contains("marketstat"));
    }
}

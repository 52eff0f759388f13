//! SQLite persistence gateway.
//!
//! Every write opens its own transaction on the shared connection; nothing
//! keeps a transaction open across calls.

mod history;
mod migrations;
mod orders;
mod reference;
mod stats;

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::Result;
use crate::records::{
    HistoryRecord, ItemType, MarketOrder, MarketStat, RegionId, Station, StationId, TypeId,
};

pub use reference::VOLUME_SCALE;

/// Narrow storage contract the ingestion pipeline runs against.
pub trait MarketStore: Send + Sync {
    /// Type ids flagged as tradable on the market.
    fn marketable_type_ids(&self) -> Result<Vec<TypeId>>;

    fn region_of(&self, station_id: StationId) -> Result<Option<RegionId>>;

    /// Days between `today` and the newest stored history day for the key.
    fn days_since_last_history(
        &self,
        type_id: TypeId,
        region_id: RegionId,
        today: NaiveDate,
    ) -> Result<Option<i64>>;

    /// Duplicate-ignoring batch insert; returns rows actually written.
    fn insert_history(&self, records: &[HistoryRecord]) -> Result<usize>;

    /// Clear-then-repopulate the region's orders, all or nothing.
    fn replace_orders(&self, region_id: RegionId, orders: &[MarketOrder]) -> Result<usize>;

    fn insert_market_stats(&self, stats: &[MarketStat], fetched_at: DateTime<Utc>) -> Result<usize>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn store_items(&self, items: &[ItemType]) -> Result<usize> {
        let mut conn = self.conn.lock();
        reference::store_items(&mut conn, items)
    }

    pub fn store_stations(&self, stations: &[Station]) -> Result<usize> {
        let mut conn = self.conn.lock();
        reference::store_stations(&mut conn, stations)
    }

    pub fn history_dates(&self, type_id: TypeId, region_id: RegionId) -> Result<Vec<NaiveDate>> {
        let conn = self.conn.lock();
        history::history_dates(&conn, type_id, region_id)
    }

    pub fn history_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        history::count_history(&conn)
    }

    pub fn order_count(&self, region_id: RegionId) -> Result<i64> {
        let conn = self.conn.lock();
        orders::count_orders(&conn, region_id)
    }

    pub fn market_stat_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        stats::count_market_stats(&conn)
    }
}

impl MarketStore for SqliteStore {
    fn marketable_type_ids(&self) -> Result<Vec<TypeId>> {
        let conn = self.conn.lock();
        reference::marketable_type_ids(&conn)
    }

    fn region_of(&self, station_id: StationId) -> Result<Option<RegionId>> {
        let conn = self.conn.lock();
        reference::region_of(&conn, station_id)
    }

    fn days_since_last_history(
        &self,
        type_id: TypeId,
        region_id: RegionId,
        today: NaiveDate,
    ) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        history::days_since_last(&conn, type_id, region_id, today)
    }

    fn insert_history(&self, records: &[HistoryRecord]) -> Result<usize> {
        let mut conn = self.conn.lock();
        history::insert_history(&mut conn, records)
    }

    fn replace_orders(&self, region_id: RegionId, orders: &[MarketOrder]) -> Result<usize> {
        let mut conn = self.conn.lock();
        orders::replace_orders(&mut conn, region_id, orders)
    }

    fn insert_market_stats(&self, stats: &[MarketStat], fetched_at: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.lock();
        stats::insert_market_stats(&mut conn, stats, fetched_at)
    }
}

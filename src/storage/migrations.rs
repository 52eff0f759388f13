use log::{debug, info};
use rusqlite::Connection;

use crate::error::Result;

/// Apply every pending named migration.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_items", CREATE_ITEMS_TABLE)?;
    run_migration(conn, "002_stations", CREATE_STATIONS_TABLE)?;
    run_migration(conn, "003_history", CREATE_HISTORY_TABLE)?;
    run_migration(conn, "004_orders", CREATE_ORDERS_TABLE)?;
    run_migration(conn, "005_market_stats", CREATE_MARKET_STATS_TABLE)?;

    debug!("Database schema up to date");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?1)", [name])?;
    }

    Ok(())
}

const CREATE_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    type_id INTEGER NOT NULL PRIMARY KEY,
    group_id INTEGER NOT NULL,
    type_name TEXT NOT NULL,
    volume INTEGER NOT NULL,
    market BOOLEAN NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_items_market ON items(market);
"#;

const CREATE_STATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stations (
    station_id INTEGER NOT NULL PRIMARY KEY,
    region_id INTEGER NOT NULL,
    solar_system_id INTEGER NOT NULL,
    name TEXT NOT NULL
);
"#;

const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type_id INTEGER NOT NULL,
    region_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    order_count INTEGER NOT NULL,
    low_price REAL NOT NULL,
    high_price REAL NOT NULL,
    avg_price REAL NOT NULL,
    volume INTEGER NOT NULL CHECK (volume >= 0),
    UNIQUE (type_id, region_id, date)
);
"#;

const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    region_id INTEGER NOT NULL,
    type_id INTEGER NOT NULL,
    station_id INTEGER NOT NULL,
    is_buy BOOLEAN NOT NULL,
    price REAL NOT NULL,
    volume_remain INTEGER NOT NULL CHECK (volume_remain >= 0),
    order_range TEXT NOT NULL,
    duration INTEGER NOT NULL,
    issued TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orders_region ON orders(region_id);
"#;

const CREATE_MARKET_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS market_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type_id INTEGER NOT NULL,
    system_id INTEGER NOT NULL,
    min_sell REAL NOT NULL,
    max_buy REAL NOT NULL,
    volume_sell INTEGER NOT NULL,
    volume_buy INTEGER NOT NULL,
    fetched_at TEXT NOT NULL
);
"#;

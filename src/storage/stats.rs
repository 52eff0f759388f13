use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::records::MarketStat;

pub fn insert_market_stats(
    conn: &mut Connection,
    stats: &[MarketStat],
    fetched_at: DateTime<Utc>,
) -> Result<usize> {
    if stats.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO market_stats
                (type_id, system_id, min_sell, max_buy, volume_sell, volume_buy, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for stat in stats {
            stmt.execute(params![
                stat.type_id,
                stat.system_id,
                stat.min_sell,
                stat.max_buy,
                stat.volume_sell,
                stat.volume_buy,
                fetched_at,
            ])?;
        }
    }
    tx.commit()?;

    Ok(stats.len())
}

pub fn count_market_stats(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM market_stats", [], |row| row.get(0))?;
    Ok(count)
}

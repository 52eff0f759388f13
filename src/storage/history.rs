use chrono::NaiveDate;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::records::{HistoryRecord, RegionId, TypeId};

/// Whole days between `today` and the newest stored day for the key, or
/// `None` when nothing is stored yet. Negative when storage is ahead of `today`.
pub fn days_since_last(
    conn: &Connection,
    type_id: TypeId,
    region_id: RegionId,
    today: NaiveDate,
) -> Result<Option<i64>> {
    // MAX over no rows yields NULL, which julianday propagates.
    let age: Option<i64> = conn.query_row(
        "SELECT CAST(julianday(?3) - julianday(MAX(date)) AS INTEGER)
         FROM history
         WHERE type_id = ?1 AND region_id = ?2",
        params![type_id, region_id, today],
        |row| row.get(0),
    )?;

    Ok(age)
}

/// Insert a batch in one transaction; rows whose day already exists are skipped.
/// Any other constraint failure aborts the whole batch.
/// Returns the number of rows actually written.
pub fn insert_history(conn: &mut Connection, records: &[HistoryRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO history
                (type_id, region_id, date, order_count, low_price, high_price, avg_price, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (type_id, region_id, date) DO NOTHING",
        )?;

        for record in records {
            inserted += stmt.execute(params![
                record.type_id,
                record.region_id,
                record.date,
                record.order_count,
                record.low_price,
                record.high_price,
                record.avg_price,
                record.volume,
            ])?;
        }
    }
    tx.commit()?;

    Ok(inserted)
}

pub fn history_dates(
    conn: &Connection,
    type_id: TypeId,
    region_id: RegionId,
) -> Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT date FROM history WHERE type_id = ?1 AND region_id = ?2 ORDER BY date",
    )?;

    let dates = stmt
        .query_map(params![type_id, region_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<NaiveDate>, _>>()?;

    Ok(dates)
}

pub fn count_history(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
    Ok(count)
}

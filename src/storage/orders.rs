use rusqlite::{params, Connection};

use crate::error::Result;
use crate::records::{MarketOrder, RegionId};

/// Swap the region's live orders for `orders` in a single transaction.
///
/// Any failed insert drops the transaction before commit, so the previous
/// snapshot survives intact.
pub fn replace_orders(
    conn: &mut Connection,
    region_id: RegionId,
    orders: &[MarketOrder],
) -> Result<usize> {
    let tx = conn.transaction()?;

    let removed = tx.execute("DELETE FROM orders WHERE region_id = ?1", params![region_id])?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO orders
                (region_id, type_id, station_id, is_buy, price, volume_remain, order_range, duration, issued)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;

        for order in orders {
            stmt.execute(params![
                region_id,
                order.type_id,
                order.station_id,
                order.is_buy,
                order.price,
                order.volume_remain,
                order.range,
                order.duration,
                order.issued,
            ])?;
        }
    }

    tx.commit()?;

    log::debug!(
        "Replaced {} orders with {} for region {}",
        removed,
        orders.len(),
        region_id
    );
    Ok(orders.len())
}

pub fn count_orders(conn: &Connection, region_id: RegionId) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE region_id = ?1",
        params![region_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::records::{ItemType, RegionId, Station, StationId, TypeId};

/// Volumes are kept as integers scaled by this factor.
pub const VOLUME_SCALE: f64 = 1000.0;

pub fn store_items(conn: &mut Connection, items: &[ItemType]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO items (type_id, group_id, type_name, volume, market)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        for item in items {
            let scaled_volume = (item.volume * VOLUME_SCALE).round() as i64;
            stmt.execute(params![
                item.type_id,
                item.group_id,
                item.name,
                scaled_volume,
                item.marketable,
            ])?;
        }
    }
    tx.commit()?;

    log::info!("Stored {} item types", items.len());
    Ok(items.len())
}

pub fn store_stations(conn: &mut Connection, stations: &[Station]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO stations (station_id, region_id, solar_system_id, name)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for station in stations {
            stmt.execute(params![
                station.station_id,
                station.region_id,
                station.solar_system_id,
                station.name,
            ])?;
        }
    }
    tx.commit()?;

    log::info!("Stored {} stations", stations.len());
    Ok(stations.len())
}

pub fn marketable_type_ids(conn: &Connection) -> Result<Vec<TypeId>> {
    let mut stmt = conn.prepare("SELECT type_id FROM items WHERE market = 1 ORDER BY type_id")?;

    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<TypeId>, _>>()?;

    Ok(ids)
}

pub fn region_of(conn: &Connection, station_id: StationId) -> Result<Option<RegionId>> {
    let region = conn
        .query_row(
            "SELECT region_id FROM stations WHERE station_id = ?1",
            params![station_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(region)
}

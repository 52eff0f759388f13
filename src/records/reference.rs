use std::fs;
use std::path::Path;

use crate::error::{Context, Result};

use super::{ItemType, Station};

/// Read the types catalog: a JSON array of `{typeID, groupID, typeName, volume, market}`.
pub fn load_item_types<P: AsRef<Path>>(path: P) -> Result<Vec<ItemType>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read types catalog at {}", path.display()))?;

    let items: Vec<ItemType> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse types catalog at {}", path.display()))?;

    Ok(items)
}

/// Read the stations CSV (`stationID,regionID,solarSystemID,stationName`).
pub fn load_stations<P: AsRef<Path>>(path: P) -> Result<Vec<Station>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open stations CSV at {}", path.display()))?;

    let mut stations = Vec::new();
    for row in reader.deserialize() {
        let station: Station = row.context("Failed to read station record")?;
        stations.push(station);
    }

    Ok(stations)
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod reference;

pub use reference::{load_item_types, load_stations};

pub type TypeId = i64;
pub type RegionId = i64;
pub type StationId = i64;
pub type SystemId = i64;

/// Static item definition seeded once from the types catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemType {
    #[serde(rename = "typeID")]
    pub type_id: TypeId,
    #[serde(rename = "groupID")]
    pub group_id: i64,
    #[serde(rename = "typeName")]
    pub name: String,
    #[serde(default)]
    pub volume: f64,
    #[serde(rename = "market", default)]
    pub marketable: bool,
}

/// Station reference row; resolves a station to the region it trades in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "stationID")]
    pub station_id: StationId,
    #[serde(rename = "regionID")]
    pub region_id: RegionId,
    #[serde(rename = "solarSystemID")]
    pub solar_system_id: SystemId,
    #[serde(rename = "stationName")]
    pub name: String,
}

/// One calendar day of aggregate trading for a type in a region.
///
/// At most one row exists per `(type_id, region_id, date)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub type_id: TypeId,
    pub region_id: RegionId,
    pub date: NaiveDate,
    pub order_count: i64,
    pub low_price: f64,
    pub high_price: f64,
    pub avg_price: f64,
    pub volume: i64,
}

/// A live order as seen at fetch time. Orders carry no identity across
/// fetches, so a region's set is always replaced wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub issued: DateTime<Utc>,
    pub is_buy: bool,
    pub price: f64,
    pub volume_remain: i64,
    pub range: String,
    pub station_id: StationId,
    pub type_id: TypeId,
    pub duration: i64,
    pub region_id: RegionId,
}

/// Quick-look aggregate for one type in one solar system.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketStat {
    pub type_id: TypeId,
    pub system_id: SystemId,
    pub min_sell: f64,
    pub max_buy: f64,
    pub volume_sell: i64,
    pub volume_buy: i64,
}

/// Key identifying a single history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    pub region_id: RegionId,
    pub type_id: TypeId,
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::AppError;
use crate::records::{HistoryRecord, MarketOrder, MarketStat, RegionId, SystemId, TypeId};

use super::FetchResult;

/// Wire shape of a payload: a JSON array of objects, or an XML document whose
/// root wraps repeated `<row>` elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Json,
    Xml,
}

/// Decode a list payload. An empty list is a valid result and, for paged
/// endpoints, marks the end of the data.
pub fn decode_list<T: DeserializeOwned>(raw: &[u8], format: PayloadFormat) -> FetchResult<Vec<T>> {
    match format {
        PayloadFormat::Json => Ok(serde_json::from_slice(raw)?),
        PayloadFormat::Xml => {
            let rows: XmlRows<T> = quick_xml::de::from_str(utf8(raw)?)?;
            Ok(rows.rows)
        }
    }
}

#[derive(Deserialize)]
struct XmlRows<T> {
    #[serde(rename = "row", default = "Vec::new")]
    rows: Vec<T>,
}

fn utf8(raw: &[u8]) -> FetchResult<&str> {
    std::str::from_utf8(raw)
        .map_err(|err| AppError::message(format!("Payload is not valid UTF-8: {err}")))
}

#[derive(Debug, Deserialize)]
struct RawHistoryDay {
    date: NaiveDate,
    order_count: i64,
    lowest: f64,
    highest: f64,
    average: f64,
    volume: i64,
}

/// Decode one (type, region) history payload, oldest day first as served.
pub fn decode_history(
    raw: &[u8],
    format: PayloadFormat,
    type_id: TypeId,
    region_id: RegionId,
) -> FetchResult<Vec<HistoryRecord>> {
    let days: Vec<RawHistoryDay> = decode_list(raw, format)?;

    Ok(days
        .into_iter()
        .map(|day| HistoryRecord {
            type_id,
            region_id,
            date: day.date,
            order_count: day.order_count,
            low_price: day.lowest,
            high_price: day.highest,
            avg_price: day.average,
            volume: day.volume,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    duration: i64,
    is_buy_order: bool,
    issued: DateTime<Utc>,
    location_id: i64,
    price: f64,
    range: String,
    type_id: TypeId,
    volume_remain: i64,
}

/// Decode one page of a region's order book.
pub fn decode_orders(
    raw: &[u8],
    format: PayloadFormat,
    region_id: RegionId,
) -> FetchResult<Vec<MarketOrder>> {
    let orders: Vec<RawOrder> = decode_list(raw, format)?;

    Ok(orders
        .into_iter()
        .map(|order| MarketOrder {
            issued: order.issued,
            is_buy: order.is_buy_order,
            price: order.price,
            volume_remain: order.volume_remain,
            range: order.range,
            station_id: order.location_id,
            type_id: order.type_id,
            duration: order.duration,
            region_id,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct EvecApi {
    marketstat: RawMarketStatBlock,
}

#[derive(Debug, Deserialize)]
struct RawMarketStatBlock {
    #[serde(rename = "type", default)]
    types: Vec<RawStatType>,
}

#[derive(Debug, Deserialize)]
struct RawStatType {
    #[serde(rename = "@id")]
    id: TypeId,
    buy: RawStatSide,
    sell: RawStatSide,
}

#[derive(Debug, Deserialize)]
struct RawStatSide {
    #[serde(default)]
    volume: f64,
    #[serde(default)]
    max: f64,
    #[serde(default)]
    min: f64,
}

/// Decode the XML quick-look document (`<evec_api><marketstat><type id=..>`).
pub fn decode_marketstat(raw: &[u8], system_id: SystemId) -> FetchResult<Vec<MarketStat>> {
    let api: EvecApi = quick_xml::de::from_str(utf8(raw)?)?;

    Ok(api
        .marketstat
        .types
        .into_iter()
        .map(|entry| MarketStat {
            type_id: entry.id,
            system_id,
            min_sell: entry.sell.min,
            max_buy: entry.buy.max,
            volume_sell: entry.sell.volume.round() as i64,
            volume_buy: entry.buy.volume.round() as i64,
        })
        .collect())
}

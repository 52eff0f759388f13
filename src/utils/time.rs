use chrono::{NaiveDate, Utc};

/// Market days roll over at downtime in UTC, so "today" is always the UTC date.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn current_human_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M UTC").to_string()
}

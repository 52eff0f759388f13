//! Decides which freshly fetched history days still need to be written.
//!
//! The remote source serves a trailing window of days, oldest first. Storage
//! reports only the age (in days) of its newest row for the key, so the plan is
//! derived from that single scalar: the last `age` days of the window, further
//! restricted to days strictly after the newest stored day. Days on or before
//! the newest stored day are never selected, even when the window has gaps.

use chrono::{Duration, NaiveDate};
use log::warn;

use crate::records::HistoryRecord;

/// Select the records that storage does not hold yet, in increasing date order.
///
/// `age` is `None` when storage has no rows for the key, otherwise
/// `today - newest_stored_date` in days.
pub fn plan(today: NaiveDate, age: Option<i64>, fresh: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
    let fresh = normalise(fresh);

    let Some(age) = age else {
        return fresh;
    };

    if age < 0 {
        if let Some(first) = fresh.first() {
            warn!(
                "stored history for type {} in region {} is {} day(s) ahead of {today}; skipping",
                first.type_id, first.region_id, -age
            );
        }
        return Vec::new();
    }

    let covered_through = today - Duration::days(age);
    let wanted = usize::try_from(age).unwrap_or(usize::MAX).min(fresh.len());
    let skip = fresh.len() - wanted;

    fresh
        .into_iter()
        .skip(skip)
        .filter(|record| record.date > covered_through)
        .collect()
}

/// Sort by date, drop repeated days and report cadence problems.
fn normalise(mut fresh: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
    let sorted = fresh.windows(2).all(|pair| pair[0].date <= pair[1].date);
    if !sorted {
        if let Some(first) = fresh.first() {
            warn!(
                "history for type {} in region {} arrived out of order",
                first.type_id, first.region_id
            );
        }
        fresh.sort_by_key(|record| record.date);
    }

    let before = fresh.len();
    fresh.dedup_by_key(|record| record.date);
    if fresh.len() != before {
        warn!("dropped {} repeated history day(s)", before - fresh.len());
    }

    if let Some(gap) = fresh
        .windows(2)
        .find(|pair| pair[1].date - pair[0].date != Duration::days(1))
    {
        warn!(
            "history for type {} in region {} skips from {} to {}",
            gap[0].type_id, gap[0].region_id, gap[0].date, gap[1].date
        );
    }

    fresh
}

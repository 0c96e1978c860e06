use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStats {
    pub year: i32,
    pub month: u32,
    pub total_bills: usize,
    pub total_amount: f64,
    pub avg_amount: f64,
}

/// Groups `(created_at, total)` pairs by calendar month, newest month first.
pub fn monthly_stats(bills: impl IntoIterator<Item = (DateTime<Utc>, f64)>) -> Vec<MonthlyStats> {
    let mut months: BTreeMap<(i32, u32), (usize, f64)> = BTreeMap::new();
    for (created_at, total) in bills {
        let entry = months
            .entry((created_at.year(), created_at.month()))
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += total;
    }
    months
        .into_iter()
        .rev()
        .map(|((year, month), (count, amount))| MonthlyStats {
            year,
            month,
            total_bills: count,
            total_amount: amount,
            avg_amount: amount / count as f64,
        })
        .collect()
}

/// First and last instant of a calendar month, both inclusive, at the
/// millisecond precision MongoDB stores.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let start = Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?);
    let end = Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?) - Duration::milliseconds(1);
    Some((start, end))
}

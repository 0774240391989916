use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use mongodb::bson::DateTime as BsonDateTime;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Whole days in `span`, rounded up. Negative spans round toward zero.
pub fn ceil_days(span: Duration) -> i64 {
    let ms = span.num_milliseconds();
    if ms > 0 {
        (ms + MS_PER_DAY - 1) / MS_PER_DAY
    } else {
        -((-ms) / MS_PER_DAY)
    }
}

/// Whole days in `span`, rounded down.
pub fn floor_days(span: Duration) -> i64 {
    span.num_milliseconds().div_euclid(MS_PER_DAY)
}

/// Midnight UTC on the first day of the month containing `now`.
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Midnight UTC on 1 January of the year containing `now`.
pub fn start_of_year(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

/// `YYYY-MM` key of the calendar month before the one containing `now`, with its bounds.
pub fn previous_month(now: DateTime<Utc>) -> (String, DateTime<Utc>, DateTime<Utc>) {
    let this_month = start_of_month(now);
    let last_instant = this_month - Duration::milliseconds(1);
    let start = start_of_month(last_instant);
    let key = format!("{:04}-{:02}", start.year(), start.month());
    (key, start, last_instant)
}

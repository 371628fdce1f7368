use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate};

/// Length of the recent-activity breakdown.
pub const RECENT_DAYS: u32 = 7;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Calendar date of a timestamp as seen from the machine producing the report.
pub fn local_date(time: DateTime<FixedOffset>) -> NaiveDate {
    time.with_timezone(&Local).date_naive()
}

/// The `count` calendar dates ending at `today`, oldest first.
pub fn trailing_days(today: NaiveDate, count: u32) -> Vec<NaiveDate> {
    (0..i64::from(count))
        .rev()
        .map(|offset| today - Duration::days(offset))
        .collect()
}

/// Inclusive span between two dates, in days.
pub fn span_days(first: NaiveDate, last: NaiveDate) -> i64 {
    last.signed_duration_since(first).num_days() + 1
}

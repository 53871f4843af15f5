use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Most recent business day strictly before the given date.
///
/// Weekend-only calendar; market holidays are not modelled, matching the
/// as-of date the portfolio query has always been submitted with.
pub fn previous_business_day(date: NaiveDate) -> NaiveDate {
    let mut current = date - Duration::days(1);
    while matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
        current -= Duration::days(1);
    }
    current
}

//! Time rules: cart reservation deadlines and payout clearance dates.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

/// How long an item stays reserved in a cart before other shoppers may take it.
pub const RESERVATION_MINUTES: i64 = 60;

/// Business days between delivery confirmation and payout availability.
pub const PAYOUT_CLEARANCE_BUSINESS_DAYS: i64 = 5;

pub fn reservation_deadline() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(RESERVATION_MINUTES)
}

/// Whole seconds until `expiration`, clamped at zero once it has passed.
pub fn seconds_until(expiration: DateTime<Utc>) -> i64 {
    (expiration - Utc::now()).num_seconds().max(0)
}

/// Walk forward one calendar day at a time, counting only Monday through
/// Friday. Confirming on a Friday with 5 business days lands on the next
/// Friday.
pub fn add_business_days(start: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let mut current = start;
    let mut added = 0;
    while added < days {
        current += Duration::days(1);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            added += 1;
        }
    }
    current
}

pub fn payout_available_on(confirmed_at: DateTime<Utc>) -> DateTime<Utc> {
    add_business_days(confirmed_at, PAYOUT_CLEARANCE_BUSINESS_DAYS)
}

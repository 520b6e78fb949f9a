//! Wall-clock helpers shared by the scheduler and the store.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Current wall-clock time in UTC.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Time remaining until `at`, or `None` when `at` is not in the future.
#[must_use]
pub fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (at - now).to_std().ok().filter(|d| !d.is_zero())
}

/// `now - age`, saturating at the earliest representable instant.
#[must_use]
pub fn older_than(age: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

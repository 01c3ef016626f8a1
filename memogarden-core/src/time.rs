//! Timestamps and day arithmetic.
//!
//! Horizons are stored as whole days since 2020-01-01 UTC so that
//! aliveness checks are integer comparisons.

use chrono::{DateTime, SecondsFormat, Utc};

/// Unix timestamp of the horizon epoch, 2020-01-01T00:00:00Z.
const EPOCH_UNIX: i64 = 1_577_836_800;

const SECS_PER_DAY: i64 = 86_400;

/// Current UTC time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time as an ISO 8601 string with `Z` suffix.
pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Render a datetime as the kernel's canonical ISO 8601 form.
pub fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a kernel timestamp back into a datetime.
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whole days elapsed since the horizon epoch.
pub fn current_day() -> i64 {
    day_of(Utc::now())
}

/// Day-since-epoch index of an arbitrary instant.
pub fn day_of(dt: DateTime<Utc>) -> i64 {
    (dt.timestamp() - EPOCH_UNIX).div_euclid(SECS_PER_DAY)
}

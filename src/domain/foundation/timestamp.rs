//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Creates a new timestamp by adding a chrono duration.
    pub fn add(&self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }

    /// Next occurrence of `time` (UTC) strictly after this timestamp.
    pub fn next_daily_at(&self, time: NaiveTime) -> Self {
        let today = self.0.date_naive().and_time(time).and_utc();
        if today > self.0 {
            Self(today)
        } else {
            Self(today + Duration::days(1))
        }
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Formats as a calendar date (`YYYY-MM-DD`).
    pub fn date_string(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
    }

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn add_days_moves_forward_by_whole_days() {
        let ts = at(2024, 1, 15, 10, 30);
        let later = ts.add_days(7);
        assert_eq!(later.as_datetime().day(), 22);
        assert_eq!(later.duration_since(&ts), Duration::days(7));
    }

    #[test]
    fn max_picks_later_timestamp() {
        let a = at(2024, 1, 1, 0, 0);
        let b = at(2024, 2, 1, 0, 0);
        assert_eq!(a.max(b), b);
        assert_eq!(b.max(a), b);
    }

    #[test]
    fn next_daily_at_same_day_when_time_ahead() {
        let ts = at(2024, 3, 10, 1, 0);
        let next = ts.next_daily_at(NaiveTime::from_hms_opt(3, 30, 0).unwrap());
        assert_eq!(next.as_datetime().day(), 10);
        assert_eq!(next.as_datetime().hour(), 3);
        assert_eq!(next.as_datetime().minute(), 30);
    }

    #[test]
    fn next_daily_at_rolls_to_tomorrow_when_time_passed() {
        let ts = at(2024, 3, 10, 4, 0);
        let next = ts.next_daily_at(NaiveTime::from_hms_opt(3, 30, 0).unwrap());
        assert_eq!(next.as_datetime().day(), 11);
    }

    #[test]
    fn next_daily_at_exact_time_rolls_forward() {
        let ts = at(2024, 3, 10, 3, 30);
        let next = ts.next_daily_at(NaiveTime::from_hms_opt(3, 30, 0).unwrap());
        assert_eq!(next.as_datetime().day(), 11);
    }

    #[test]
    fn timestamp_serializes_to_json() {
        let ts = at(2024, 1, 15, 10, 30);
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.contains("2024-01-15"));
    }

    #[test]
    fn date_string_formats_calendar_date() {
        assert_eq!(at(2024, 1, 5, 23, 59).date_string(), "2024-01-05");
    }
}

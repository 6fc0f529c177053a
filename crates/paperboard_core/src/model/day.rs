//! Calendar day keys used to partition the board into per-day views.
//!
//! # Invariants
//! - A day key is derived from a note's creation timestamp in the local
//!   timezone and rendered as `YYYY-MM-DD`.
//! - The same timestamp always yields the same key for a given timezone.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::fmt::{Display, Formatter};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar date grouping key (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Derives the key for an epoch-millisecond timestamp in local time.
    pub fn from_timestamp_ms(timestamp_ms: i64) -> Self {
        Self::from_timestamp_ms_in(timestamp_ms, &Local)
    }

    /// Derives the key for an epoch-millisecond timestamp in `tz`.
    ///
    /// Out-of-range timestamps fall back to the Unix epoch day.
    pub fn from_timestamp_ms_in<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> Self {
        let utc = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_default();
        Self(utc.with_timezone(tz).date_naive())
    }

    /// Today's key in local time.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Parses a `YYYY-MM-DD` string.
    pub fn parse(value: &str) -> Option<Self> {
        NaiveDate::parse_from_str(value.trim(), DAY_KEY_FORMAT)
            .ok()
            .map(Self)
    }

    /// The previous calendar day; saturates at the minimum date.
    pub fn prev(self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    /// The next calendar day; saturates at the maximum date.
    pub fn next(self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl Display for DayKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::DayKey;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    #[test]
    fn formats_as_zero_padded_date() {
        let key = DayKey::from_date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(key.to_string(), "2024-03-05");
        assert_eq!(DayKey::parse("2024-03-05"), Some(key));
    }

    #[test]
    fn timezone_decides_the_calendar_day() {
        let utc_late = chrono::Utc
            .with_ymd_and_hms(2024, 3, 5, 23, 30, 0)
            .unwrap()
            .timestamp_millis();
        let east = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(
            DayKey::from_timestamp_ms_in(utc_late, &chrono::Utc).to_string(),
            "2024-03-05"
        );
        assert_eq!(
            DayKey::from_timestamp_ms_in(utc_late, &east).to_string(),
            "2024-03-06"
        );
    }

    #[test]
    fn prev_and_next_cross_month_boundaries() {
        let key = DayKey::parse("2024-03-01").unwrap();
        assert_eq!(key.prev().to_string(), "2024-02-29");
        assert_eq!(key.prev().next(), key);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(DayKey::parse("yesterday"), None);
        assert_eq!(DayKey::parse("2024-13-01"), None);
    }
}

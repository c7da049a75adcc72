//! Raw time records and the rounded hour quantity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

/// Seconds in one tenth of an hour.
const SECONDS_PER_TENTH: u64 = 360;

/// A tracked interval as reported by the time-tracking service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRecord {
    /// Service-side identifier, when the source provides one.
    pub id: Option<i64>,
    /// When the interval started.
    pub start: DateTime<Utc>,
    /// Length of a completed interval. Negative while the timer is running.
    pub duration_seconds: i64,
    /// Free-text task description.
    pub label: Option<String>,
}

impl TimeRecord {
    /// Returns true if this record is the running sentinel.
    pub const fn is_running(&self) -> bool {
        self.duration_seconds < 0
    }

    /// Seconds this record contributes as of `as_of`.
    ///
    /// Completed records contribute their duration. Running records contribute
    /// the time since `start`, clamped to zero when `as_of` precedes it.
    pub fn elapsed_seconds<Tz: TimeZone>(&self, as_of: &DateTime<Tz>) -> u64 {
        if self.is_running() {
            let elapsed = as_of.with_timezone(&Utc) - self.start;
            u64::try_from(elapsed.num_seconds()).unwrap_or(0)
        } else {
            self.duration_seconds.unsigned_abs()
        }
    }
}

/// Error returned when an hour magnitude cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid hour value: {value:?}")]
pub struct InvalidHours {
    pub value: String,
}

/// A non-negative number of hours rounded to one decimal place.
///
/// Stored as whole tenths so that rounding, comparison, and display are exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hours(u32);

impl Hours {
    pub const ZERO: Self = Self(0);

    /// Creates a value from a count of tenths of an hour.
    pub const fn from_tenths(tenths: u32) -> Self {
        Self(tenths)
    }

    /// Rounds elapsed seconds to the nearest tenth of an hour, halves away
    /// from zero.
    pub fn from_seconds(seconds: u64) -> Self {
        let tenths = seconds.saturating_add(SECONDS_PER_TENTH / 2) / SECONDS_PER_TENTH;
        Self(u32::try_from(tenths).unwrap_or(u32::MAX))
    }

}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl FromStr for Hours {
    type Err = InvalidHours;

    /// Parses `H`, `H.`, or `H.ddd`. Extra decimals are rounded half away
    /// from zero to the nearest tenth.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidHours {
            value: s.to_string(),
        };

        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty()
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let mut digits = fraction.bytes().map(|b| u32::from(b - b'0'));
        let tenth = digits.next().unwrap_or(0);
        let carry = u32::from(digits.next().is_some_and(|hundredth| hundredth >= 5));

        whole
            .checked_mul(10)
            .and_then(|tenths| tenths.checked_add(tenth + carry))
            .map(Self)
            .ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn running(start: DateTime<Utc>) -> TimeRecord {
        TimeRecord {
            id: None,
            start,
            duration_seconds: -1,
            label: None,
        }
    }

    #[test]
    fn hours_round_half_away_from_zero() {
        assert_eq!(Hours::from_seconds(0), Hours::ZERO);
        assert_eq!(Hours::from_seconds(179), Hours::ZERO);
        assert_eq!(Hours::from_seconds(180), Hours::from_tenths(1));
        assert_eq!(Hours::from_seconds(5400), Hours::from_tenths(15));
        assert_eq!(Hours::from_seconds(5579), Hours::from_tenths(15));
        assert_eq!(Hours::from_seconds(5580), Hours::from_tenths(16));
    }

    #[test]
    fn hours_display_keeps_trailing_zero() {
        assert_eq!(Hours::from_tenths(30).to_string(), "3.0");
        assert_eq!(Hours::from_tenths(5).to_string(), "0.5");
        assert_eq!(Hours::from_tenths(123).to_string(), "12.3");
    }

    #[test]
    fn hours_parse_accepts_grammar_forms() {
        assert_eq!("3".parse::<Hours>().unwrap(), Hours::from_tenths(30));
        assert_eq!("3.".parse::<Hours>().unwrap(), Hours::from_tenths(30));
        assert_eq!("2.5".parse::<Hours>().unwrap(), Hours::from_tenths(25));
        assert_eq!("2.25".parse::<Hours>().unwrap(), Hours::from_tenths(23));
        assert_eq!("2.249".parse::<Hours>().unwrap(), Hours::from_tenths(22));
        assert_eq!("0.95".parse::<Hours>().unwrap(), Hours::from_tenths(10));
    }

    #[test]
    fn hours_parse_rejects_garbage() {
        assert!("".parse::<Hours>().is_err());
        assert!(".5".parse::<Hours>().is_err());
        assert!("-1.0".parse::<Hours>().is_err());
        assert!("1.a".parse::<Hours>().is_err());
        assert!("99999999999".parse::<Hours>().is_err());
    }

    #[test]
    fn running_record_elapsed_is_clamped() {
        let start = Utc.with_ymd_and_hms(2025, 4, 9, 10, 0, 0).unwrap();
        let record = running(start);

        let later = Utc.with_ymd_and_hms(2025, 4, 9, 10, 30, 0).unwrap();
        assert_eq!(record.elapsed_seconds(&later), 1800);

        let earlier = Utc.with_ymd_and_hms(2025, 4, 9, 9, 0, 0).unwrap();
        assert_eq!(record.elapsed_seconds(&earlier), 0);
    }
}

//! Civil-day boundaries.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

/// The UTC instants bounding one civil day, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Computes the window for `date` in the timezone `tz`.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let next = date.succ_opt().unwrap_or(date);
        Self {
            date,
            start: local_midnight_to_utc(date, tz),
            end: local_midnight_to_utc(next, tz),
        }
    }

    /// The window containing `now`, using `now`'s own timezone.
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self::for_date(now.date_naive(), &now.timezone())
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Moves `instant` forward to the window start if it lies before it.
    pub fn clamp_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        instant.max(self.start)
    }
}

/// Converts local midnight on `date` to UTC.
///
/// DST fall-back picks the earlier instant. When midnight falls into a
/// spring-forward gap the day starts at 01:00 local.
fn local_midnight_to_utc<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map_or_else(
                || Utc.from_utc_datetime(&midnight),
                |dt| dt.with_timezone(&Utc),
            ),
    }
}

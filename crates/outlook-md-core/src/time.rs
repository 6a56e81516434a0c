//! Query windows.
//!
//! A [`TimeWindow`] is the half-open interval `[start, end)` sent to the
//! calendar service. Both ends carry the offset of the timezone the window was
//! computed in, so they serialize as offset-qualified timestamps.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors building a time window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// The window ends before it starts.
    #[error("window end {end} is before start {start}")]
    Inverted { start: String, end: String },

    /// Local midnight does not exist on this date in this timezone.
    #[error("no valid local midnight on {date} in {tz}")]
    NoLocalMidnight { date: NaiveDate, tz: String },

    /// A window bound could not be parsed.
    #[error("invalid date or timestamp '{0}' (expected YYYY-MM-DD or RFC 3339)")]
    InvalidBound(String),
}

/// Named windows understood by the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Today, local midnight to the next local midnight.
    Today,
    /// Tomorrow, local midnight to the following local midnight.
    Tomorrow,
    /// The current week, Monday 00:00 to the next Monday 00:00.
    Week,
}

/// A time window for querying calendar events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<FixedOffset>,
    /// End of the window (exclusive).
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// Creates a window, rejecting `end < start`.
    pub fn new(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Self, WindowError> {
        if end < start {
            return Err(WindowError::Inverted {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Creates the window covering the given local dates `[first, last_exclusive)`.
    pub fn for_dates(first: NaiveDate, last_exclusive: NaiveDate, tz: &Tz) -> Result<Self, WindowError> {
        let start = local_midnight(first, tz)?;
        let end = local_midnight(last_exclusive, tz)?;
        Self::new(start, end)
    }

    /// Computes a named window relative to `now` in the given timezone.
    pub fn for_kind(kind: WindowKind, now: DateTime<Utc>, tz: &Tz) -> Result<Self, WindowError> {
        let today = now.with_timezone(tz).date_naive();
        match kind {
            WindowKind::Today => Self::for_dates(today, today + Duration::days(1), tz),
            WindowKind::Tomorrow => {
                let tomorrow = today + Duration::days(1);
                Self::for_dates(tomorrow, tomorrow + Duration::days(1), tz)
            }
            WindowKind::Week => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                Self::for_dates(monday, monday + Duration::days(7), tz)
            }
        }
    }

    /// Parses an explicit window from two bounds.
    ///
    /// Each bound is either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date,
    /// which means local midnight in `tz`.
    pub fn parse(start: &str, end: &str, tz: &Tz) -> Result<Self, WindowError> {
        Self::new(parse_bound(start, tz)?, parse_bound(end, tz)?)
    }
}

fn parse_bound(value: &str, tz: &Tz) -> Result<DateTime<FixedOffset>, WindowError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(tz).fixed_offset());
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| WindowError::InvalidBound(value.to_string()))?;
    local_midnight(date, tz)
}

/// Resolves 00:00 on `date` in `tz`.
///
/// Where a DST transition swallows midnight, the first valid instant of the
/// following hour is used.
fn local_midnight(date: NaiveDate, tz: &Tz) -> Result<DateTime<FixedOffset>, WindowError> {
    let midnight: NaiveDateTime = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| WindowError::NoLocalMidnight {
            date,
            tz: tz.name().to_string(),
        })
}

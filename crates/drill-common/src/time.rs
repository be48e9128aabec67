//! Time range handling for drill queries.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Parse a timestamp as supplied in process inputs.
///
/// Accepts RFC 3339 (`2019-03-05T10:00:00+10:00`), naive date-times
/// (assumed UTC, with `T` or space separator, optional fractional seconds),
/// dates (`2019-03-05`), year-months (`2019-03`) and years (`2019`).
/// Partial values resolve to the start of the period.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    parse_with_period(s).map(|(start, _)| start)
}

/// Parse a timestamp, returning the start of the period it names and the
/// length of that period (zero for full timestamps).
fn parse_with_period(s: &str) -> Result<(DateTime<Utc>, Period), TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok((dt.with_timezone(&Utc), Period::Instant));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok((Utc.from_utc_datetime(&ndt), Period::Instant));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok((midnight(date), Period::Day));
    }

    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
        return Ok((midnight(date), Period::Month));
    }

    if s.len() == 4 {
        if let Some(date) = s.parse::<i32>().ok().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)) {
            return Ok((midnight(date), Period::Year));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Instant,
    Day,
    Month,
    Year,
}

impl Period {
    /// Last instant of the period starting at `start`.
    fn end_of(self, start: DateTime<Utc>) -> DateTime<Utc> {
        use chrono::{Datelike, Months};

        let next = match self {
            Period::Instant => return start,
            Period::Day => start + Duration::days(1),
            Period::Month => start
                .checked_add_months(Months::new(1))
                .unwrap_or(start + Duration::days(31)),
            Period::Year => Utc
                .with_ymd_and_hms(start.year() + 1, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(start + Duration::days(366)),
        };
        next - Duration::microseconds(1)
    }
}

/// An inclusive time range for dataset discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Build a range from two user-supplied bounds. A partial end bound
    /// (`2019-07-10`, `2005`) covers the whole day/month/year it names.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        let (start_dt, _) = parse_with_period(start)?;
        let (end_start, period) = parse_with_period(end)?;
        let end_dt = period.end_of(end_start);

        if end_dt < start_dt {
            return Err(TimeParseError::Reversed {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self::new(start_dt, end_dt))
    }

    /// A single period such as `"2000"` expanded to its full extent.
    pub fn single(period: &str) -> Result<Self, TimeParseError> {
        Self::parse(period, period)
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Time range end {end} is before start {start}")]
    Reversed { start: String, end: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_datetime_formats() {
        let dt = parse_datetime("2019-03-05T12:30:00Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2019, 3, 5, 12));

        let dt = parse_datetime("2019-03-05T12:30:00+10:00").unwrap();
        assert_eq!(dt.hour(), 2);

        let dt = parse_datetime("2019-03-05 01:02:03.5").unwrap();
        assert_eq!(dt.second(), 3);

        let dt = parse_datetime("2019-03-05").unwrap();
        assert_eq!((dt.day(), dt.hour()), (5, 0));

        let dt = parse_datetime("2019").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2019, 1, 1));

        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_date_end_bound_covers_whole_day() {
        let range = TimeRange::parse("2019-03-05", "2019-07-10").unwrap();
        let late = Utc.with_ymd_and_hms(2019, 7, 10, 23, 59, 0).unwrap();
        let next = Utc.with_ymd_and_hms(2019, 7, 11, 0, 0, 0).unwrap();
        assert!(range.contains(&late));
        assert!(!range.contains(&next));
    }

    #[test]
    fn test_single_year() {
        let range = TimeRange::single("2000").unwrap();
        assert!(range.contains(&Utc.with_ymd_and_hms(2000, 12, 31, 12, 0, 0).unwrap()));
        assert!(!range.contains(&Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        assert!(matches!(
            TimeRange::parse("2020-01-01", "2019-01-01"),
            Err(TimeParseError::Reversed { .. })
        ));
    }
}

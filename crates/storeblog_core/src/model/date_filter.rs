//! Publication-date filters.
//!
//! A filter resolves to an inclusive span `[beginning_of(period),
//! end_of(period)]` in the store's configured UTC offset. The span end is
//! the last millisecond before the next period starts.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Calendar unit a date filter spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Month,
    Year,
}

impl Period {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Some(Self::Day),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

/// Date filter input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateFilter {
    /// The period containing a concrete point in time.
    At { at: DateTime<Utc>, period: Period },
    /// A partial calendar date; the finest field supplied sets the period.
    Partial {
        year: i32,
        month: Option<u32>,
        day: Option<u32>,
    },
}

impl DateFilter {
    pub fn year(year: i32) -> Self {
        Self::Partial {
            year,
            month: None,
            day: None,
        }
    }

    pub fn month(year: i32, month: u32) -> Self {
        Self::Partial {
            year,
            month: Some(month),
            day: None,
        }
    }

    pub fn day(year: i32, month: u32, day: u32) -> Self {
        Self::Partial {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    /// Resolves the filter to an inclusive UTC span.
    pub fn span(&self, offset: FixedOffset) -> Result<PublishedSpan, DateFilterError> {
        let (anchor, period) = match *self {
            Self::At { at, period } => {
                let local = at.with_timezone(&offset).date_naive();
                let anchor = match period {
                    Period::Day => Some(local),
                    Period::Month => NaiveDate::from_ymd_opt(local.year(), local.month(), 1),
                    Period::Year => NaiveDate::from_ymd_opt(local.year(), 1, 1),
                };
                (anchor.ok_or(DateFilterError::OutOfRange)?, period)
            }
            Self::Partial { year, month, day } => {
                let period = match (month, day) {
                    (None, Some(_)) => return Err(DateFilterError::DayWithoutMonth),
                    (Some(_), Some(_)) => Period::Day,
                    (Some(_), None) => Period::Month,
                    (None, None) => Period::Year,
                };
                let anchor =
                    NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1)).ok_or(
                        DateFilterError::InvalidDate {
                            year,
                            month,
                            day,
                        },
                    )?;
                (anchor, period)
            }
        };

        let next = next_anchor(anchor, period).ok_or(DateFilterError::OutOfRange)?;
        let start = local_midnight(anchor, offset).ok_or(DateFilterError::OutOfRange)?;
        let next_start = local_midnight(next, offset).ok_or(DateFilterError::OutOfRange)?;

        Ok(PublishedSpan {
            start,
            end: next_start - Duration::milliseconds(1),
            period,
        })
    }
}

/// Inclusive publication span produced by [`DateFilter::span`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period: Period,
}

impl PublishedSpan {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilterError {
    /// Fields do not name a calendar date (e.g. month 13, February 30).
    InvalidDate {
        year: i32,
        month: Option<u32>,
        day: Option<u32>,
    },
    /// A day was supplied without its month.
    DayWithoutMonth,
    /// The span falls outside the representable time range.
    OutOfRange,
}

impl Display for DateFilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate { year, month, day } => write!(
                f,
                "invalid date: year={year} month={} day={}",
                display_opt(*month),
                display_opt(*day)
            ),
            Self::DayWithoutMonth => write!(f, "date filter has a day but no month"),
            Self::OutOfRange => write!(f, "date filter is out of range"),
        }
    }
}

impl Error for DateFilterError {}

fn display_opt(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

fn next_anchor(anchor: NaiveDate, period: Period) -> Option<NaiveDate> {
    match period {
        Period::Day => anchor.succ_opt(),
        Period::Month if anchor.month() == 12 => NaiveDate::from_ymd_opt(anchor.year() + 1, 1, 1),
        Period::Month => NaiveDate::from_ymd_opt(anchor.year(), anchor.month() + 1, 1),
        Period::Year => NaiveDate::from_ymd_opt(anchor.year() + 1, 1, 1),
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::{DateFilter, DateFilterError, Period};
    use chrono::{FixedOffset, TimeZone, Utc};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn partial_month_spans_whole_month() {
        let span = DateFilter::month(2024, 2).span(utc()).unwrap();
        assert_eq!(span.period, Period::Month);
        assert_eq!(span.start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(
            span.end,
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()
                + chrono::Duration::milliseconds(999)
        );
    }

    #[test]
    fn december_rolls_into_next_year() {
        let span = DateFilter::month(2023, 12).span(utc()).unwrap();
        assert!(span.contains(Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap()));
        assert!(!span.contains(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn period_is_inferred_from_finest_field() {
        assert_eq!(DateFilter::year(2024).span(utc()).unwrap().period, Period::Year);
        assert_eq!(
            DateFilter::day(2024, 3, 5).span(utc()).unwrap().period,
            Period::Day
        );
    }

    #[test]
    fn point_filter_uses_configured_offset() {
        // 23:30 UTC on Jan 31 is already Feb 1 at UTC+2.
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let span = DateFilter::At {
            at,
            period: Period::Month,
        }
        .span(offset)
        .unwrap();
        assert_eq!(span.start, Utc.with_ymd_and_hms(2024, 1, 31, 22, 0, 0).unwrap());
        assert!(span.contains(at));
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert!(matches!(
            DateFilter::month(2024, 13).span(utc()),
            Err(DateFilterError::InvalidDate { .. })
        ));
        assert!(matches!(
            DateFilter::day(2023, 2, 29).span(utc()),
            Err(DateFilterError::InvalidDate { .. })
        ));
        let day_only = DateFilter::Partial {
            year: 2024,
            month: None,
            day: Some(3),
        };
        assert_eq!(day_only.span(utc()), Err(DateFilterError::DayWithoutMonth));
    }

    #[test]
    fn period_parse_accepts_known_units() {
        assert_eq!(Period::parse(" Month "), Some(Period::Month));
        assert_eq!(Period::parse("week"), None);
    }
}

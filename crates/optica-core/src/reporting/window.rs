//! Reporting periods and the date windows they resolve to.
//!
//! Every window is half-open `[start, end)` in UTC. The previous window is the
//! calendar period right before the current one; custom ranges compare against
//! an equally long range ending where the current one starts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{ReportError, ReportResult};
use crate::models::Actor;

/// Reporting period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    #[default]
    Week,
    Month,
    Year,
    Custom,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "custom" => Ok(Self::Custom),
            _ => Err(ReportError::InvalidPeriod(s.to_string())),
        }
    }
}

/// Branch filter of a report request: every branch or one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BranchFilter {
    #[default]
    All,
    Branch(String),
}

impl BranchFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::All,
            Some(value) if value.eq_ignore_ascii_case("all") => Self::All,
            Some(value) => Self::Branch(value.to_string()),
        }
    }

    /// Branch the actor may actually see. Only admins can look across branches.
    pub fn scoped_to(&self, actor: &Actor) -> Option<String> {
        if !actor.is_admin() {
            return Some(actor.branch_id.clone());
        }
        match self {
            Self::All => None,
            Self::Branch(id) => Some(id.clone()),
        }
    }
}

/// Parameters shared by every dashboard report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportQuery {
    pub period: Period,
    /// First day of a custom range, inclusive
    pub start_date: Option<NaiveDate>,
    /// Last day of a custom range, inclusive
    pub end_date: Option<NaiveDate>,
    pub branch: BranchFilter,
    /// Reference date; defaults to the current UTC date
    pub today: Option<NaiveDate>,
}

impl ReportQuery {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    pub fn windows(&self) -> ReportResult<ReportWindows> {
        resolve_windows(self.period, self.reference_date(), self.start_date, self.end_date)
    }

    /// Resolve the date windows up front. Fails on ranges that cannot be
    /// represented or are longer than [`MAX_CUSTOM_RANGE_DAYS`].
    pub fn resolve(&self) -> ReportResult<ResolvedReport> {
        Ok(ResolvedReport {
            period: self.period,
            windows: self.windows()?,
            year: self.reference_date().year(),
            branch: self.branch.clone(),
        })
    }
}

/// A report query whose windows are already computed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReport {
    pub period: Period,
    pub windows: ReportWindows,
    /// Reference year, used by the monthly revenue series
    pub year: i32,
    pub branch: BranchFilter,
}

/// Half-open UTC interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }
}

/// The current window and the one it is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindows {
    pub current: DateWindow,
    pub previous: DateWindow,
}

/// Longest custom range, in days, a report accepts.
pub const MAX_CUSTOM_RANGE_DAYS: i64 = 5 * 366;

pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub(crate) fn first_of_month(year: i32, month: u32) -> ReportResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ReportError::InvalidRange(format!("{}-{:02}", year, month)))
}

fn next_month(date: NaiveDate) -> ReportResult<NaiveDate> {
    if date.month() == 12 {
        first_of_month(date.year() + 1, 1)
    } else {
        first_of_month(date.year(), date.month() + 1)
    }
}

fn out_of_range(what: impl fmt::Display) -> ReportError {
    ReportError::InvalidRange(format!("{} is out of range", what))
}

fn shift(at: DateTime<Utc>, by: Duration) -> ReportResult<DateTime<Utc>> {
    at.checked_add_signed(by).ok_or_else(|| out_of_range(at.date_naive()))
}

fn previous_month(date: NaiveDate) -> ReportResult<NaiveDate> {
    if date.month() == 1 {
        first_of_month(date.year() - 1, 12)
    } else {
        first_of_month(date.year(), date.month() - 1)
    }
}

/// Resolve a period around `today` into current and previous windows.
pub fn resolve_windows(
    period: Period,
    today: NaiveDate,
    custom_start: Option<NaiveDate>,
    custom_end: Option<NaiveDate>,
) -> ReportResult<ReportWindows> {
    let day = Duration::days(1);

    let (current, previous) = match period {
        Period::Day => {
            let start = midnight(today);
            (DateWindow::new(start, shift(start, day)?), DateWindow::new(shift(start, -day)?, start))
        }
        Period::Week => {
            let monday = today
                .checked_sub_days(Days::new(today.weekday().num_days_from_monday() as u64))
                .ok_or_else(|| out_of_range(today))?;
            let start = midnight(monday);
            let week = Duration::days(7);
            (DateWindow::new(start, shift(start, week)?), DateWindow::new(shift(start, -week)?, start))
        }
        Period::Month => {
            let first = first_of_month(today.year(), today.month())?;
            let start = midnight(first);
            (
                DateWindow::new(start, midnight(next_month(first)?)),
                DateWindow::new(midnight(previous_month(first)?), start),
            )
        }
        Period::Year => {
            let start = midnight(first_of_month(today.year(), 1)?);
            (
                DateWindow::new(start, midnight(first_of_month(today.year() + 1, 1)?)),
                DateWindow::new(midnight(first_of_month(today.year() - 1, 1)?), start),
            )
        }
        Period::Custom => {
            let first = custom_start.unwrap_or(today);
            let last = custom_end.unwrap_or(today);
            if last < first {
                return Err(ReportError::InvalidRange(format!("{} is after {}", first, last)));
            }
            let days = last.signed_duration_since(first).num_days() + 1;
            if days > MAX_CUSTOM_RANGE_DAYS {
                return Err(ReportError::InvalidRange(format!(
                    "{} to {} spans {} days, at most {} allowed",
                    first, last, days, MAX_CUSTOM_RANGE_DAYS
                )));
            }
            let after_last = last.succ_opt().ok_or_else(|| out_of_range(last))?;
            let current = DateWindow::new(midnight(first), midnight(after_last));
            let previous = DateWindow::new(shift(current.start, -current.length())?, current.start);
            (current, previous)
        }
    };

    Ok(ReportWindows { current, previous })
}

/// Chart buckets for a window: 6-hour slots for a day, months for a year,
/// days otherwise. Each bucket carries its display label.
pub fn buckets(period: Period, window: &DateWindow) -> ReportResult<Vec<(String, DateWindow)>> {
    let mut buckets = Vec::new();
    let mut cursor = window.start;

    while cursor < window.end {
        let (label, next) = match period {
            Period::Day => (cursor.format("%H:%M").to_string(), shift(cursor, Duration::hours(6))?),
            Period::Year => {
                let date = cursor.date_naive();
                (cursor.format("%b").to_string(), midnight(next_month(date)?))
            }
            _ => (cursor.format("%b %d").to_string(), shift(cursor, Duration::days(1))?),
        };
        let end = next.min(window.end);
        buckets.push((label, DateWindow::new(cursor, end)));
        cursor = next;
    }

    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_window() {
        let w = resolve_windows(Period::Day, date(2024, 3, 15), None, None).unwrap();
        assert_eq!(w.current.start, midnight(date(2024, 3, 15)));
        assert_eq!(w.current.end, midnight(date(2024, 3, 16)));
        assert_eq!(w.previous.start, midnight(date(2024, 3, 14)));
        assert_eq!(w.previous.end, w.current.start);
    }

    #[test]
    fn test_week_starts_monday() {
        // 2024-03-17 is a Sunday
        let w = resolve_windows(Period::Week, date(2024, 3, 17), None, None).unwrap();
        assert_eq!(w.current.start, midnight(date(2024, 3, 11)));
        assert_eq!(w.current.end, midnight(date(2024, 3, 18)));
        assert_eq!(w.previous.start, midnight(date(2024, 3, 4)));

        let monday = resolve_windows(Period::Week, date(2024, 3, 11), None, None).unwrap();
        assert_eq!(monday.current, w.current);
    }

    #[test]
    fn test_month_previous_is_calendar_month() {
        let w = resolve_windows(Period::Month, date(2024, 3, 31), None, None).unwrap();
        assert_eq!(w.current.start, midnight(date(2024, 3, 1)));
        assert_eq!(w.current.end, midnight(date(2024, 4, 1)));
        assert_eq!(w.previous.start, midnight(date(2024, 2, 1)));
        assert_eq!(w.previous.end, midnight(date(2024, 3, 1)));
    }

    #[test]
    fn test_month_wraps_year() {
        let w = resolve_windows(Period::Month, date(2024, 1, 10), None, None).unwrap();
        assert_eq!(w.previous.start, midnight(date(2023, 12, 1)));

        let w = resolve_windows(Period::Month, date(2023, 12, 10), None, None).unwrap();
        assert_eq!(w.current.end, midnight(date(2024, 1, 1)));
    }

    #[test]
    fn test_year_window() {
        let w = resolve_windows(Period::Year, date(2024, 6, 1), None, None).unwrap();
        assert_eq!(w.current.start, midnight(date(2024, 1, 1)));
        assert_eq!(w.current.end, midnight(date(2025, 1, 1)));
        assert_eq!(w.previous.start, midnight(date(2023, 1, 1)));
    }

    #[test]
    fn test_custom_inclusive_dates() {
        let w = resolve_windows(Period::Custom, date(2024, 6, 1), Some(date(2024, 5, 10)), Some(date(2024, 5, 12))).unwrap();
        assert_eq!(w.current.start, midnight(date(2024, 5, 10)));
        assert_eq!(w.current.end, midnight(date(2024, 5, 13)));
        assert_eq!(w.previous.start, midnight(date(2024, 5, 7)));
        assert_eq!(w.previous.end, w.current.start);
    }

    #[test]
    fn test_custom_defaults_to_today() {
        let w = resolve_windows(Period::Custom, date(2024, 6, 1), None, None).unwrap();
        assert_eq!(w.current.length(), Duration::days(1));
    }

    #[test]
    fn test_custom_reversed_rejected() {
        let result = resolve_windows(Period::Custom, date(2024, 6, 1), Some(date(2024, 5, 12)), Some(date(2024, 5, 10)));
        assert!(matches!(result, Err(ReportError::InvalidRange(_))));
    }

    #[test]
    fn test_custom_range_too_long_rejected() {
        let far = NaiveDate::from_ymd_opt(262142, 12, 31).unwrap();
        let result = resolve_windows(Period::Custom, date(2024, 6, 1), Some(date(2024, 1, 1)), Some(far));
        assert!(matches!(result, Err(ReportError::InvalidRange(_))));

        let result = resolve_windows(Period::Custom, date(2024, 6, 1), Some(date(1, 1, 1)), Some(date(9999, 12, 31)));
        assert!(matches!(result, Err(ReportError::InvalidRange(_))));

        let limit = date(2020, 1, 1) + Duration::days(MAX_CUSTOM_RANGE_DAYS - 1);
        let w = resolve_windows(Period::Custom, date(2024, 6, 1), Some(date(2020, 1, 1)), Some(limit)).unwrap();
        assert_eq!(w.current.length(), Duration::days(MAX_CUSTOM_RANGE_DAYS));
    }

    #[test]
    fn test_calendar_edges_rejected_not_panicking() {
        let max = NaiveDate::MAX;
        let min = NaiveDate::MIN;

        let result = resolve_windows(Period::Custom, max, Some(max), Some(max));
        assert!(matches!(result, Err(ReportError::InvalidRange(_))));
        let result = resolve_windows(Period::Custom, min, Some(min), Some(min));
        assert!(matches!(result, Err(ReportError::InvalidRange(_))));

        for period in [Period::Day, Period::Week, Period::Month, Period::Year] {
            assert!(matches!(resolve_windows(period, max, None, None), Err(ReportError::InvalidRange(_))));
            assert!(matches!(resolve_windows(period, min, None, None), Err(ReportError::InvalidRange(_))));
        }
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("MONTH".parse::<Period>().unwrap(), Period::Month);
        assert!(matches!("fortnight".parse::<Period>(), Err(ReportError::InvalidPeriod(_))));
    }

    #[test]
    fn test_buckets() {
        let w = resolve_windows(Period::Day, date(2024, 3, 15), None, None).unwrap();
        let day = buckets(Period::Day, &w.current).unwrap();
        assert_eq!(day.len(), 4);
        assert_eq!(day[1].0, "06:00");

        let w = resolve_windows(Period::Week, date(2024, 3, 15), None, None).unwrap();
        let week = buckets(Period::Week, &w.current).unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].0, "Mar 11");

        let w = resolve_windows(Period::Year, date(2024, 3, 15), None, None).unwrap();
        let year = buckets(Period::Year, &w.current).unwrap();
        assert_eq!(year.len(), 12);
        assert_eq!(year[11].0, "Dec");
        assert_eq!(year[1].1.length(), Duration::days(29));
    }

    #[test]
    fn test_branch_scoping() {
        let clerk = Actor::new("u1", "Ana", "b1");
        let admin = Actor::new("u2", "Root", "b1").with_role("admin");

        assert_eq!(BranchFilter::All.scoped_to(&clerk), Some("b1".into()));
        assert_eq!(BranchFilter::Branch("b2".into()).scoped_to(&clerk), Some("b1".into()));
        assert_eq!(BranchFilter::All.scoped_to(&admin), None);
        assert_eq!(BranchFilter::Branch("b2".into()).scoped_to(&admin), Some("b2".into()));
        assert_eq!(BranchFilter::parse(Some("ALL")), BranchFilter::All);
        assert_eq!(BranchFilter::parse(None), BranchFilter::All);
    }
}

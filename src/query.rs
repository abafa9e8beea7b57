use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::ValueEnum;

use crate::error::AppError;

pub const DEFAULT_LIMIT: i64 = 30;
pub const MAX_LIMIT: i64 = 100;

/// Inclusive date window; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            start: start.map(|v| parse_date("start_date", v)).transpose()?,
            end: end.map(|v| parse_date("end_date", v)).transpose()?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        Self { limit, offset }
    }

    pub fn has_more(&self, total: usize) -> bool {
        i64::try_from(total).unwrap_or(i64::MAX) > self.offset.saturating_add(self.limit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// How far back the dashboard counts new patients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DashboardPeriod {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl DashboardPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardPeriod::Week => "week",
            DashboardPeriod::Month => "month",
            DashboardPeriod::Quarter => "quarter",
            DashboardPeriod::Year => "year",
        }
    }

    /// `week` is the last seven days to the instant; the others start at
    /// midnight UTC. Month arithmetic clamps to the last day of a short month.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let day = match self {
            DashboardPeriod::Week => return now - Duration::days(7),
            DashboardPeriod::Month => today.with_day0(0),
            DashboardPeriod::Quarter => today.checked_sub_months(Months::new(3)),
            DashboardPeriod::Year => today.checked_sub_months(Months::new(12)),
        };
        let midnight = day.unwrap_or(today).and_time(NaiveTime::MIN);
        Utc.from_utc_datetime(&midnight)
    }
}

/// Accepts `YYYY-MM-DD` only, and only if it names a real calendar day.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, AppError> {
    let invalid = || AppError::InvalidDate {
        field,
        value: value.to_string(),
    };

    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}

pub fn require_id(id: i32, entity: &'static str) -> Result<i32, AppError> {
    if id <= 0 {
        return Err(AppError::InvalidId { entity });
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_match_the_strict_shape() {
        assert_eq!(
            parse_date("start_date", "2024-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert!(parse_date("start_date", "2024-1-5").is_err());
        assert!(parse_date("start_date", "2024/01/05").is_err());
        assert!(parse_date("start_date", "20240105").is_err());
        assert!(parse_date("start_date", " 2024-01-05").is_err());
    }

    #[test]
    fn impossible_calendar_days_are_rejected() {
        let err = parse_date("end_date", "2023-02-29").unwrap_err();
        assert_eq!(err.code(), "INVALID_DATE_FORMAT");
        assert!(parse_date("end_date", "2024-02-29").is_ok());
        assert!(parse_date("end_date", "2024-13-01").is_err());
    }

    #[test]
    fn range_reports_the_offending_field() {
        let err = DateRange::parse(Some("2024-01-01"), Some("tomorrow")).unwrap_err();
        assert!(err.to_string().contains("end_date"));

        let range = DateRange::parse(Some("2024-01-02"), Some("2024-01-04")).unwrap();
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
        assert!(DateRange::default().contains(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()));
    }

    #[test]
    fn page_limits_are_clamped() {
        assert_eq!(Page::new(None, None), Page { limit: 30, offset: 0 });
        assert_eq!(Page::new(Some(500), Some(-3)), Page { limit: 100, offset: 0 });
        assert!(Page::new(Some(10), Some(0)).has_more(11));
        assert!(!Page::new(Some(10), Some(0)).has_more(10));
    }

    #[test]
    fn huge_offsets_have_nothing_more() {
        let page = Page::new(Some(10), Some(i64::MAX));
        assert_eq!(page.offset, i64::MAX);
        assert!(!page.has_more(5));
        assert!(!page.has_more(usize::MAX));
    }

    #[test]
    fn dashboard_periods_start_where_expected() {
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 15, 30, 0).unwrap();
        let midnight = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap();

        assert_eq!(
            DashboardPeriod::Week.start(now),
            Utc.with_ymd_and_hms(2024, 5, 24, 15, 30, 0).unwrap()
        );
        assert_eq!(DashboardPeriod::Month.start(now), midnight(2024, 5, 1));
        assert_eq!(DashboardPeriod::Quarter.start(now), midnight(2024, 2, 29));
        assert_eq!(DashboardPeriod::Year.start(now), midnight(2023, 5, 31));
        assert_eq!(DashboardPeriod::default().as_str(), "month");
    }

    #[test]
    fn ids_must_be_positive() {
        assert_eq!(require_id(4, "patient").unwrap(), 4);
        assert_eq!(require_id(0, "patient").unwrap_err().code(), "INVALID_PATIENT_ID");
    }
}

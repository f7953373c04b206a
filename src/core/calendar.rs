//! Business calendar - converts UTC instants to the store's local calendar days.
//!
//! Invoice numbering, daily listings and reports all bucket transactions by the
//! business-local date rather than the UTC date. Report series group those dates
//! further into calendar weeks (Sunday first), months and years.

use crate::config::settings::BusinessConfig;
use crate::errors::Result;
use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, TimeZone, Utc};
use serde::Serialize;

/// Calendar unit a report series is bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Period {
    /// One local day
    Day,
    /// Sunday through Saturday
    Week,
    /// A calendar month
    Month,
    /// A calendar year
    Year,
}

/// Inclusive local date range `first..=last` of one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodSpan {
    /// First local date
    pub first: NaiveDate,
    /// Last local date
    pub last: NaiveDate,
}

impl Period {
    /// First date of the period containing `date`.
    #[must_use]
    pub fn start_of(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => Some(date),
            Self::Week => date.checked_sub_days(Days::new(u64::from(
                date.weekday().num_days_from_sunday(),
            ))),
            Self::Month => date.with_day(1),
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
    }

    fn shift_back(self, start: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Self::Day => start.checked_sub_days(Days::new(u64::from(steps))),
            Self::Week => start.checked_sub_days(Days::new(7 * u64::from(steps))),
            Self::Month => start.checked_sub_months(Months::new(steps)),
            Self::Year => start.checked_sub_months(Months::new(steps.checked_mul(12)?)),
        }
    }

    fn next_start(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => start.checked_add_days(Days::new(1)),
            Self::Week => start.checked_add_days(Days::new(7)),
            Self::Month => start.checked_add_months(Months::new(1)),
            Self::Year => start.checked_add_months(Months::new(12)),
        }
    }

    /// The period containing `date`.
    #[must_use]
    pub fn span_of(self, date: NaiveDate) -> Option<PeriodSpan> {
        let first = self.start_of(date)?;
        let last = self.next_start(first)?.pred_opt()?;
        Some(PeriodSpan { first, last })
    }

    /// The `count` periods ending with the one containing `date`, oldest first.
    /// Periods that fall outside the representable calendar are left out.
    #[must_use]
    pub fn trailing(self, date: NaiveDate, count: u32) -> Vec<PeriodSpan> {
        let Some(current) = self.start_of(date) else {
            return Vec::new();
        };
        (0..count)
            .rev()
            .filter_map(|back| self.shift_back(current, back))
            .filter_map(|first| self.span_of(first))
            .collect()
    }
}

/// Day-bucketing rules for a fixed-offset business timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    /// Creates a calendar for the given offset from UTC.
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Creates a calendar from the `[business]` settings.
    pub fn from_config(config: &BusinessConfig) -> Result<Self> {
        Ok(Self::new(config.offset()?))
    }

    /// The business timezone offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The local calendar date of a UTC instant.
    #[must_use]
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Today's local date.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// The UTC instant at which a local date begins.
    #[must_use]
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        // A fixed offset has exactly one local midnight per day.
        self.offset
            .from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
            .single()
            .map_or_else(
                || date.and_time(chrono::NaiveTime::MIN).and_utc(),
                |local| local.with_timezone(&Utc),
            )
    }

    /// Half-open UTC interval `[start, end)` covering one local day.
    #[must_use]
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        self.range_bounds(date, date)
    }

    /// Half-open UTC interval covering one period.
    #[must_use]
    pub fn span_bounds(&self, span: PeriodSpan) -> (DateTime<Utc>, DateTime<Utc>) {
        self.range_bounds(span.first, span.last)
    }

    /// Half-open UTC interval covering the inclusive local date range `first..=last`.
    #[must_use]
    pub fn range_bounds(&self, first: NaiveDate, last: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_of_day(first);
        let end = last
            .checked_add_days(Days::new(1))
            .map_or(DateTime::<Utc>::MAX_UTC, |next| self.start_of_day(next));
        (start, end)
    }
}

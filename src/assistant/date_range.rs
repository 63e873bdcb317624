//! Natural-language period → `[start, end]`.
//!
//! Recognised phrases are checked in a fixed order and the first substring
//! match wins. Anything unrecognised yields an open range (`start = None`),
//! which callers treat as "no date filter".

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;

static QUARTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)q([1-4])\s*(\d{4})").expect("quarter pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: NaiveDateTime,
}

impl DateRange {
    fn open(now: NaiveDateTime) -> Self {
        Self { start: None, end: now }
    }

    fn closed(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start: Some(start), end }
    }

    /// Query bounds. An open range constrains neither side.
    pub fn bounds(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        match self.start {
            Some(start) => (Some(start), Some(self.end)),
            None => (None, None),
        }
    }
}

/// Resolve `phrase` relative to `now`. Deterministic in both inputs.
pub fn parse_date_range(phrase: &str, now: NaiveDateTime) -> DateRange {
    let phrase = phrase.trim().to_lowercase();
    if phrase.is_empty() {
        return DateRange::open(now);
    }
    recognise(&phrase, now).unwrap_or_else(|| DateRange::open(now))
}

fn recognise(phrase: &str, now: NaiveDateTime) -> Option<DateRange> {
    let today = now.date();

    if phrase.contains("today") {
        return Some(DateRange::closed(midnight(today), now));
    }
    if phrase.contains("yesterday") {
        let yesterday = today.pred_opt()?;
        return Some(DateRange::closed(midnight(yesterday), midnight(today)));
    }
    if phrase.contains("this week") {
        return Some(DateRange::closed(midnight(week_start(today)), now));
    }
    if phrase.contains("last week") {
        let start = week_start(today) - TimeDelta::days(7);
        return Some(DateRange::closed(midnight(start), end_of_day(start + TimeDelta::days(6))));
    }
    if phrase.contains("this month") {
        let first = today.with_day(1)?;
        return Some(DateRange::closed(midnight(first), now));
    }
    if phrase.contains("last month") {
        let last = today.with_day(1)?.pred_opt()?;
        let first = last.with_day(1)?;
        return Some(DateRange::closed(midnight(first), end_of_day(last)));
    }
    if phrase.contains("this year") {
        let first = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
        return Some(DateRange::closed(midnight(first), now));
    }
    if phrase.contains("last year") {
        let year = today.year() - 1;
        let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31)?;
        return Some(DateRange::closed(midnight(first), end_of_day(last)));
    }

    let caps = QUARTER.captures(phrase)?;
    let quarter: u32 = caps[1].parse().ok()?;
    let year: i32 = caps[2].parse().ok()?;
    quarter_range(quarter, year)
}

fn quarter_range(quarter: u32, year: i32) -> Option<DateRange> {
    let first = NaiveDate::from_ymd_opt(year, 3 * (quarter - 1) + 1, 1)?;
    let last = if quarter == 4 {
        NaiveDate::from_ymd_opt(year, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(year, 3 * quarter + 1, 1)?.pred_opt()?
    };
    Some(DateRange::closed(midnight(first), end_of_day(last)))
}

/// Most recent Sunday, or `day` itself when it is a Sunday.
fn week_start(day: NaiveDate) -> NaiveDate {
    day - TimeDelta::days(i64::from(day.weekday().num_days_from_sunday()))
}

fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

/// Last whole second of `day`; stored timestamps carry no sub-second part.
fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    midnight(day) + TimeDelta::seconds(86_399)
}

//! FILENAME: core/records/src/date.rs
//! PURPOSE: Date parsing and period bucketing.
//! CONTEXT: Grouping and filtering share one bucketing function so a filter
//! value and a row label for the same period always compare equal. Sorting
//! parses bucket labels back into the first day of their period.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::BLANK_LABEL;

/// Date-bucketing resolution for axis and filter fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Quarter,
    Year,
    /// Financial year starting in April (month index 3).
    FinancialYear,
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::Day
    }
}

/// Month index (0-based) at which the financial year starts.
pub const FINANCIAL_YEAR_START_MONTH0: u32 = 3;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Formats tried after the ISO and `D-MMM-YY` forms. Day-first for slash
/// dates, matching the ledger exports this engine reads.
const GENERIC_FORMATS: [&str; 8] = [
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

// ============================================================================
// PARSING
// ============================================================================

/// Parses a date string. Accepts ISO `YYYY-MM-DD` (with an optional time
/// part), `D-MMM-YY` / `D-MMM-YYYY`, then a handful of generic layouts.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(date) = parse_iso(s) {
        return Some(date);
    }
    if let Some(date) = parse_day_month_abbr(s) {
        return Some(date);
    }

    if let Some(date) = parse_compact(s) {
        return Some(date);
    }

    for format in GENERIC_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }

    None
}

/// Parses a JSON value as a date. Strings go through `parse_date`;
/// eight-digit integers are read as `YYYYMMDD`.
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date(s),
        Value::Number(n) => {
            let i = n.as_i64()?;
            if (10_000_101..=99_991_231).contains(&i) {
                parse_date(&i.to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10)?;
    match s.as_bytes().get(10) {
        None | Some(b'T') | Some(b't') | Some(b' ') => {}
        Some(_) => return None,
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// `YYYYMMDD`, the layout ledger exports use for voucher dates.
fn parse_compact(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `1-Apr-24`, `01-apr-2024`, `15-April-2024`.
fn parse_day_month_abbr(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('-');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    if day.is_empty() || day.len() > 2 || !day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let day: u32 = day.parse().ok()?;
    let month = month_from_name(month)?;
    let year = parse_year(year)?;

    NaiveDate::from_ymd_opt(year, month, day)
}

/// 1-based month number from `Apr`, `apr`, `April`.
fn month_from_name(name: &str) -> Option<u32> {
    if name.len() < 3 || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let abbr = name[..3].to_ascii_lowercase();
    MONTH_ABBREVIATIONS
        .iter()
        .position(|m| *m == abbr)
        .map(|i| i as u32 + 1)
}

/// Two-digit years pivot at 70 (`69` → 2069, `70` → 1970).
fn parse_year(s: &str) -> Option<i32> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match s.len() {
        2 => {
            let yy: i32 = s.parse().ok()?;
            Some(if yy < 70 { 2000 + yy } else { 1900 + yy })
        }
        4 => s.parse().ok(),
        _ => None,
    }
}

// ============================================================================
// BUCKETING
// ============================================================================

/// Week number: `ceil((daysSinceJan1 + Jan1Weekday + 1) / 7)`, Sunday = 0.
pub fn week_number(date: NaiveDate) -> u32 {
    let jan1_weekday = NaiveDate::from_ymd_opt(date.year(), 1, 1)
        .map(|d| d.weekday().num_days_from_sunday())
        .unwrap_or(0);
    (date.ordinal0() + jan1_weekday + 1 + 6) / 7
}

/// Financial year label year: calendar year, minus one before April.
pub fn financial_year(date: NaiveDate) -> i32 {
    if date.month0() < FINANCIAL_YEAR_START_MONTH0 {
        date.year() - 1
    } else {
        date.year()
    }
}

/// Produces the bucket label for a parsed date.
pub fn bucket_date(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => format!("Week {} - {}", week_number(date), date.year()),
        Granularity::Month => date.format("%b-%y").to_string(),
        Granularity::Quarter => format!("{}-Q{}", date.year(), date.month0() / 3 + 1),
        Granularity::Year => format!("{}", date.year()),
        Granularity::FinancialYear => format!("FY-{}", financial_year(date)),
    }
}

/// Buckets a raw string; unparsable input yields `(blank)`.
pub fn bucket_label(raw: &str, granularity: Granularity) -> String {
    match parse_date(raw) {
        Some(date) => bucket_date(date, granularity),
        None => BLANK_LABEL.to_string(),
    }
}

/// Buckets a JSON value; unparsable or missing input yields `(blank)`.
pub fn bucket_value(value: Option<&Value>, granularity: Granularity) -> String {
    match value.and_then(parse_date_value) {
        Some(date) => bucket_date(date, granularity),
        None => BLANK_LABEL.to_string(),
    }
}

// ============================================================================
// LABEL PARSING (for chronological sorting)
// ============================================================================

static WEEK_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)week\s+(\d{1,2})\s+-\s+(\d{4})$").expect("valid regex"));
static MONTH_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]{3})-(\d{2})$").expect("valid regex"));
static QUARTER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").expect("valid regex"));
static FY_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FY-(\d{4})$").expect("valid regex"));
static YEAR_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").expect("valid regex"));

/// Parses either a raw date or a bucket label into the first day of its
/// period. Week labels are clamped to their own year so week order never
/// crosses a year boundary.
///
/// Month labels carry a two-digit year, read with the 70 pivot: a 1965
/// month (`Jan-65`) comes back as 2065 and sorts after `Jan-24`.
pub fn parse_period_label(label: &str) -> Option<NaiveDate> {
    let s = label.trim();
    if let Some(date) = parse_date(s) {
        return Some(date);
    }

    if let Some(caps) = WEEK_LABEL.captures(s) {
        let week: i64 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let dec31 = NaiveDate::from_ymd_opt(year, 12, 31)?;
        let start = jan1.checked_add_signed(Duration::days((week.max(1) - 1) * 7))?;
        return Some(start.min(dec31));
    }
    if let Some(caps) = MONTH_LABEL.captures(s) {
        let month = month_from_name(&caps[1])?;
        let year = parse_year(&caps[2])?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if let Some(caps) = QUARTER_LABEL.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let quarter: u32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1);
    }
    if let Some(caps) = FY_LABEL.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, FINANCIAL_YEAR_START_MONTH0 + 1, 1);
    }
    if let Some(caps) = YEAR_LABEL.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_date("2024-04-01"), Some(ymd(2024, 4, 1)));
        assert_eq!(parse_date("2024-04-01T10:30:00Z"), Some(ymd(2024, 4, 1)));
        assert_eq!(parse_date("1-Apr-24"), Some(ymd(2024, 4, 1)));
        assert_eq!(parse_date("01-APR-2024"), Some(ymd(2024, 4, 1)));
        assert_eq!(parse_date("20240401"), Some(ymd(2024, 4, 1)));
        assert_eq!(parse_date("15/04/2024"), Some(ymd(2024, 4, 15)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date_value(&json!(20240401)), Some(ymd(2024, 4, 1)));
        assert_eq!(parse_date_value(&json!(12)), None);
    }

    #[test]
    fn test_bucket_labels() {
        let d = ymd(2024, 4, 15);
        assert_eq!(bucket_date(d, Granularity::Day), "2024-04-15");
        assert_eq!(bucket_date(d, Granularity::Month), "Apr-24");
        assert_eq!(bucket_date(d, Granularity::Quarter), "2024-Q2");
        assert_eq!(bucket_date(d, Granularity::Year), "2024");
        assert_eq!(bucket_date(d, Granularity::FinancialYear), "FY-2024");
        assert_eq!(bucket_date(ymd(2025, 3, 31), Granularity::FinancialYear), "FY-2024");
        assert_eq!(bucket_label("garbage", Granularity::Month), BLANK_LABEL);
        assert_eq!(bucket_value(None, Granularity::Year), BLANK_LABEL);
    }

    #[test]
    fn test_week_number() {
        // 2024-01-01 is a Monday (weekday 1): ceil((0 + 1 + 1) / 7) = 1
        assert_eq!(week_number(ymd(2024, 1, 1)), 1);
        // Saturday 2024-01-06: ceil((5 + 1 + 1) / 7) = 1
        assert_eq!(week_number(ymd(2024, 1, 6)), 1);
        // Sunday 2024-01-07 starts week 2
        assert_eq!(week_number(ymd(2024, 1, 7)), 2);
        assert_eq!(bucket_date(ymd(2024, 1, 7), Granularity::Week), "Week 2 - 2024");
    }

    #[test]
    fn test_period_labels_parse_back_in_order() {
        assert_eq!(parse_period_label("Apr-24"), Some(ymd(2024, 4, 1)));
        assert_eq!(parse_period_label("2024-Q3"), Some(ymd(2024, 7, 1)));
        assert_eq!(parse_period_label("FY-2023"), Some(ymd(2023, 4, 1)));
        assert_eq!(parse_period_label("2022"), Some(ymd(2022, 1, 1)));
        assert!(parse_period_label("Week 53 - 2023") < parse_period_label("Week 1 - 2024"));
        assert_eq!(parse_period_label("(blank)"), None);
    }

    #[test]
    fn test_month_labels_use_the_two_digit_year_pivot() {
        assert_eq!(bucket_date(ymd(1965, 1, 10), Granularity::Month), "Jan-65");
        assert_eq!(parse_period_label("Jan-65"), Some(ymd(2065, 1, 1)));
        assert_eq!(parse_period_label("Jan-70"), Some(ymd(1970, 1, 1)));
    }

    #[test]
    fn test_granularity_serde_names() {
        assert_eq!(
            serde_json::to_string(&Granularity::FinancialYear).unwrap(),
            "\"financialYear\""
        );
        let g: Granularity = serde_json::from_str("\"month\"").unwrap();
        assert_eq!(g, Granularity::Month);
    }
}

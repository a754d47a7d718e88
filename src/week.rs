use std::sync::LazyLock;

use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;

use crate::error::ParseError;

pub const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

static SPACED_DASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*-\s*").unwrap());

fn is_dash(c: char) -> bool {
    matches!(c, '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}')
}

/// Canonical form of a week label, used for parsing and as the de-duplication key.
pub fn normalize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}'))
        .map(|c| match c {
            c if is_dash(c) => '-',
            '\u{00A0}' => ' ',
            c => c,
        })
        .collect();
    SPACED_DASH_RE.replace_all(cleaned.trim(), "-").into_owned()
}

/// 1-based month number for a full English month name, any case.
pub fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u32 + 1)
}

/// Month and start day of a week label, without assigning a year.
pub fn label_month_day(label: &str) -> Result<(u32, u32), ParseError> {
    let normalized = normalize_label(label);
    let head = normalized.split(',').next().unwrap_or_default();
    let mut tokens = head.split_whitespace();

    let month_token = tokens.next().ok_or(ParseError::Empty)?;
    let month = month_number(month_token)
        .ok_or_else(|| ParseError::UnknownMonth(month_token.to_string()))?;

    let day_token = tokens
        .next()
        .ok_or_else(|| ParseError::InvalidDay(head.to_string()))?;
    let day: u32 = day_token
        .split('-')
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| ParseError::InvalidDay(day_token.to_string()))?;

    Ok((month, day))
}

/// Parse a week label into the date of its first day.
///
/// Returns `(start, year, month)` where `year` and `month` are the cursor
/// values to pass to the next call. The year is bumped whenever the month goes
/// backwards relative to `prior_month`, so labels must arrive in calendar order.
pub fn parse_week_label(
    label: &str,
    prior_year: i32,
    prior_month: Option<u32>,
) -> Result<(NaiveDate, i32, u32), ParseError> {
    let (month, day) = label_month_day(label)?;

    let year = match prior_month {
        Some(prev) if month < prev => prior_year + 1,
        _ => prior_year,
    };
    let start = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(ParseError::InvalidDate { year, month, day })?;

    Ok((start, year, month))
}

/// Year of the first label in a chronological list, inferred from when the
/// list was written.
///
/// The last parsable label is pinned to the candidate date nearest `anchor`
/// that is not more than `horizon_months` after it (nothing later is
/// published yet), then the year rollovers between first and last label are
/// walked back. `None` when no label parses.
pub fn infer_start_year<S: AsRef<str>>(labels: &[S], anchor: NaiveDate, horizon_months: u32) -> Option<i32> {
    let mut rollovers = 0;
    let mut prior_month = None;
    let mut last = None;
    for label in labels {
        let Ok((month, day)) = label_month_day(label.as_ref()) else { continue };
        if prior_month.is_some_and(|prev| month < prev) {
            rollovers += 1;
        }
        prior_month = Some(month);
        last = Some((month, day));
    }

    let (month, day) = last?;
    let limit = anchor
        .checked_add_months(Months::new(horizon_months))
        .unwrap_or(anchor);
    let last_year = (anchor.year() - 1..=anchor.year() + 1)
        .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
        .filter(|d| *d <= limit)
        .min_by_key(|d| (*d - anchor).num_days().abs())?
        .year();

    Some(last_year - rollovers)
}

/// Running year/month state for a chronological sequence of week labels.
#[derive(Debug, Clone, Copy)]
pub struct WeekCursor {
    year: i32,
    last_month: Option<u32>,
}

impl WeekCursor {
    pub fn new(start_year: i32) -> Self {
        WeekCursor {
            year: start_year,
            last_month: None,
        }
    }

    /// Date the next label. A label that fails to parse leaves the cursor as it was.
    pub fn advance(&mut self, label: &str) -> Result<NaiveDate, ParseError> {
        let (start, year, month) = parse_week_label(label, self.year, self.last_month)?;
        self.year = year;
        self.last_month = Some(month);
        Ok(start)
    }

    pub fn year(&self) -> i32 {
        self.year
    }
}

/// URL of the workbook page for one week.
///
/// Workbook issues are bimonthly and start on odd months, so a week belongs to
/// the issue of the month its first day falls in.
pub fn workbook_page_url(base: &str, label: &str, start: NaiveDate) -> String {
    let month = start.month() as usize;
    let first = if month % 2 == 1 { month } else { month - 1 };
    let issue = format!(
        "{}-{}-{}-mwb",
        MONTHS[first - 1].to_lowercase(),
        MONTHS[first].to_lowercase(),
        start.year()
    );

    let normalized = normalize_label(label);
    let slug = normalized
        .split(',')
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    format!(
        "{}/{}/Life-and-Ministry-Meeting-Schedule-for-{}-{}/",
        base.trim_end_matches('/'),
        issue,
        slug,
        start.year()
    )
}

// ── Tests ──

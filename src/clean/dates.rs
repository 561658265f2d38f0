use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::table::{Cell, Table};

/// Day zero of the workbook serial-date epoch.
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid epoch")
}

/// Date-only formats, tried in order. Month-first is preferred over
/// day-first for ambiguous slashed dates, matching how the upstream
/// spreadsheets are authored; unambiguous day-first values still parse
/// because an out-of-range month fails over to the next format.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %b %Y",
];

/// Formats carrying a time-of-day component; the time is discarded.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse one raw string as a calendar date. Accepts the textual formats
/// above plus numeric workbook serials (days since 1899-12-30, fractional
/// part = time of day). Unparseable input yields `None`, never an error.
pub fn parse_date_value(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    // Workbook serial number, e.g. "45231" or "45231.5".
    if let Ok(serial) = s.parse::<f64>() {
        if (1.0..=120_000.0).contains(&serial) {
            return serial_epoch().checked_add_signed(Duration::days(serial.trunc() as i64));
        }
    }

    None
}

/// Parse any cell as a date: dates pass through, numbers are treated as
/// workbook serials, text goes through the format list.
pub fn parse_date_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Int(v) => {
            if (1..=120_000).contains(v) {
                serial_epoch().checked_add_signed(Duration::days(*v))
            } else {
                None
            }
        }
        Cell::Float(v) => {
            if (1.0..=120_000.0).contains(v) {
                serial_epoch().checked_add_signed(Duration::days(v.trunc() as i64))
            } else {
                None
            }
        }
        Cell::Text(s) => parse_date_value(s),
        _ => None,
    }
}

/// Quarter of the year, 1-4.
pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// Expand one date-like column into the original values plus derived
/// `_date`, `_year`, `_month`, `_day`, `_qtr`, and `_week` columns.
/// Unparseable values produce nulls across the derived set.
pub fn parse_date_column(values: &[Cell], base_name: &str) -> Table {
    let columns = vec![
        base_name.to_string(),
        format!("{base_name}_date"),
        format!("{base_name}_year"),
        format!("{base_name}_month"),
        format!("{base_name}_day"),
        format!("{base_name}_qtr"),
        format!("{base_name}_week"),
    ];
    let mut out = Table::new(base_name, columns);

    for value in values {
        let parsed = parse_date_cell(value);
        let row = match parsed {
            Some(d) => vec![
                value.clone(),
                Cell::Date(d),
                Cell::Int(d.year() as i64),
                Cell::Int(d.month() as i64),
                Cell::Int(d.day() as i64),
                Cell::Int(quarter_of(d) as i64),
                Cell::Int(d.iso_week().week() as i64),
            ],
            None => vec![
                value.clone(),
                Cell::Null,
                Cell::Null,
                Cell::Null,
                Cell::Null,
                Cell::Null,
                Cell::Null,
            ],
        };
        out.push_row(row);
    }

    out
}

static DATE_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"date", r"time", r"approved", r"promised", r"created", r"updated", r"modified", r"sop",
        r"milestone",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid pattern"))
    .collect()
});

static DATE_EXCLUDE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"supplier.*pn",
        r"original.*supplier.*pn",
        r"supplier pn",
        r"original supplier pn",
        r"part.*number",
        r"pn$",
        r"id$",
        r"code$",
        r"number$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid pattern"))
    .collect()
});

const DETECT_SAMPLE_LIMIT: usize = 10;

/// Name-and-content heuristic for date columns: the column name must hit a
/// date-ish token without hitting an identifier-ish one, and at least half
/// of a small non-null sample must parse as dates.
pub fn detect_date_columns(table: &Table) -> Vec<String> {
    let mut detected = Vec::new();

    for (idx, name) in table.columns.iter().enumerate() {
        let lower = name.to_lowercase();

        if DATE_EXCLUDE_PATTERNS.iter().any(|re| re.is_match(&lower)) {
            continue;
        }
        if !DATE_NAME_PATTERNS.iter().any(|re| re.is_match(&lower)) {
            continue;
        }

        let sample: Vec<&Cell> = table
            .rows
            .iter()
            .map(|row| &row[idx])
            .filter(|c| !c.is_blank())
            .take(DETECT_SAMPLE_LIMIT)
            .collect();
        if sample.is_empty() {
            continue;
        }

        let parsed = sample.iter().filter(|c| parse_date_cell(c).is_some()).count();
        let ratio = parsed as f64 / sample.len() as f64;
        if ratio >= 0.5 {
            tracing::debug!(column = %name, ratio, "detected date column");
            detected.push(name.clone());
        }
    }

    detected
}

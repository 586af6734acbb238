//! Date parsing for date-mapped columns

use crate::table::CellValue;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

/// Date-only text layouts, tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %B %Y",
    "%m/%d/%y",
];

/// Date-time text layouts, tried after the date-only ones
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Largest serial Excel can display (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Parse a cell into a calendar date.
///
/// Date-time cells are taken as is, numbers are read as Excel serial days,
/// and text is tried against the known layouts. Returns `None` for blank or
/// unparseable values.
pub fn parse_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Int(serial) => from_excel_serial(*serial as f64),
        CellValue::Float(serial) => from_excel_serial(*serial),
        CellValue::Text(text) => parse_date_text(text),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

/// Parse free text in any of the supported layouts
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            // %Y happily reads "90" as year 90; leave two-digit years to %y
            if format.ends_with("%y") || plausible_year(date) {
                return Some(date);
            }
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            if plausible_year(dt.date()) {
                return Some(dt.date());
            }
        }
    }

    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.date_naive())
}

fn plausible_year(date: NaiveDate) -> bool {
    (1000..=9999).contains(&date.year())
}

/// Convert an Excel serial day number (1900 date system) to a date
pub fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    // Day 0 is 1899-12-30, which absorbs Excel's phantom 1900-02-29
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

//! Date helpers shared by the overdue filter and the spreadsheet mapping.
//!
//! Dates are kept as text on task documents; they are parsed leniently when needed
//! and an unparseable value is treated as absent.

use calamine::{ExcelDateTime, ExcelDateTimeType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn today_iso() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Parse a stored date or timestamp. Date-only values are midnight UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `DD/MM/YYYY` for spreadsheet cells. Unparseable input is returned as is.
pub fn format_day_month_year(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    match parse_instant(raw) {
        Some(dt) => dt.format("%d/%m/%Y").to_string(),
        None => raw.to_string(),
    }
}

/// Reorder `D/M/Y` text to `YYYY-MM-DD`.
pub fn day_month_year_to_iso(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.trim().split('/').map(str::trim).collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    if day.is_empty() || month.is_empty() || year.is_empty() {
        return None;
    }
    Some(format!("{}-{:0>2}-{:0>2}", year, month, day))
}

/// Last day a workbook can hold, 9999-12-31.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Decode a workbook date cell with calamine's date-code parser (1900 or 1904
/// system, as the cell says). Durations and out-of-range values are not dates.
pub fn excel_date_to_iso(value: &ExcelDateTime) -> Option<String> {
    let serial = value.as_f64();
    if !value.is_datetime() || !(1.0..=MAX_EXCEL_SERIAL + 1.0).contains(&serial) {
        return None;
    }
    value
        .as_datetime()
        .map(|dt| dt.date().format("%Y-%m-%d").to_string())
}

/// Decode a bare numeric cell as a 1900-system date serial.
pub fn excel_serial_to_iso(serial: f64) -> Option<String> {
    excel_date_to_iso(&ExcelDateTime::new(
        serial,
        ExcelDateTimeType::DateTime,
        false,
    ))
}

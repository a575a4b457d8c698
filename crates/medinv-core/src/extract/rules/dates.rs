//! Date normalization for sheet cells.

use chrono::NaiveDate;

use super::patterns::{DATE_DMY, DATE_LONG, DATE_YMD};
use crate::sheet::Cell;

/// Display format for all dates on invoices.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a textual date: `15/01/2024`, `15.01.24`, `2024-01-15` or
/// `15 Jan 2024`. Day-first is assumed for the slash/dot forms.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    if let Some(caps) = DATE_YMD.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = DATE_DMY.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = parse_year(&caps[3]);
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = DATE_LONG.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month = english_month_to_number(&caps[2]);
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// Normalize a date cell to `DD/MM/YYYY`. Unparseable text is kept verbatim;
/// blank cells give `None`.
pub fn normalize_date(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Date(dt) => Some(dt.format(DATE_FORMAT).to_string()),
        Cell::Text(s) => {
            let text = cell.text()?;
            Some(
                parse_date(s)
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or(text),
            )
        }
        other => other.text(),
    }
}

/// Normalize free text that may hold a date (metadata values).
pub fn normalize_date_text(text: &str) -> String {
    parse_date(text)
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 { 2000 + year } else { 1900 + year }
    } else {
        year
    }
}

fn english_month_to_number(month: &str) -> u32 {
    match month.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("15/01/2024"), Some(expected));
        assert_eq!(parse_date("15.01.24"), Some(expected));
        assert_eq!(parse_date("2024-01-15"), Some(expected));
        assert_eq!(parse_date("15 Jan 2024"), Some(expected));
        assert_eq!(parse_date("15 January, 2024"), Some(expected));
        assert_eq!(parse_date("15/01/2024 09:30 AM"), Some(expected));
    }

    #[test]
    fn test_parse_date_rejects_invalid() {
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_normalize_date_cell() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(normalize_date(&Cell::Date(dt)).as_deref(), Some("05/03/2024"));
        assert_eq!(
            normalize_date(&Cell::Text("2024-03-05".into())).as_deref(),
            Some("05/03/2024")
        );
        assert_eq!(
            normalize_date(&Cell::Text("after surgery".into())).as_deref(),
            Some("after surgery")
        );
        assert_eq!(normalize_date(&Cell::Empty), None);
    }
}

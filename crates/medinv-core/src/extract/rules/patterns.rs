//! Common regex patterns for spreadsheet cell parsing.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Currency tokens appearing next to amounts
    pub static ref CURRENCY_TOKEN: Regex = Regex::new(
        r"(?i)(?:L\.?E\.?|EGP|USD|EUR|SAR|AED|ج\.?\s?م\.?|جنيه(?:\s*مصري)?|[$€£])"
    ).unwrap();

    // Plain number after cleaning: digits with `,`/`.` separators
    pub static ref NUMBER_TEXT: Regex = Regex::new(
        r"^-?(?:\d[\d,.]*)$"
    ).unwrap();

    // Digit groups separated by a single kind of thousands separator
    pub static ref GROUPED_COMMA: Regex = Regex::new(
        r"^-?\d{1,3}(?:,\d{3})+$"
    ).unwrap();

    pub static ref GROUPED_DOT: Regex = Regex::new(
        r"^-?\d{1,3}(?:\.\d{3}){2,}$"
    ).unwrap();

    // Dates
    pub static ref DATE_DMY: Regex = Regex::new(
        r"^(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})(?:\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AaPp][Mm])?)?$"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})(?:[T\s]\d{1,2}:\d{2}(?::\d{2})?)?$"
    ).unwrap();

    pub static ref DATE_LONG: Regex = Regex::new(
        r"(?i)^(\d{1,2})[\s\-]+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?[\s\-,]+(\d{4})$"
    ).unwrap();

    // Collapses runs of whitespace in labels
    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_token() {
        assert!(CURRENCY_TOKEN.is_match("1,250.00 EGP"));
        assert!(CURRENCY_TOKEN.is_match("٣٠٠ ج.م"));
        assert!(CURRENCY_TOKEN.is_match("$15"));
        assert!(!CURRENCY_TOKEN.is_match("1250"));
    }

    #[test]
    fn test_grouping_patterns() {
        assert!(GROUPED_COMMA.is_match("1,000"));
        assert!(GROUPED_COMMA.is_match("12,345,678"));
        assert!(!GROUPED_COMMA.is_match("1,5"));
        assert!(GROUPED_DOT.is_match("1.000.000"));
        assert!(!GROUPED_DOT.is_match("1.000"));
    }

    #[test]
    fn test_date_patterns() {
        assert!(DATE_DMY.is_match("15/01/2024"));
        assert!(DATE_DMY.is_match("5-1-24"));
        assert!(DATE_DMY.is_match("15/01/2024 10:30 AM"));
        assert!(DATE_YMD.is_match("2024-01-15"));
        assert!(DATE_YMD.is_match("2024-01-15T08:00:00"));
        assert!(DATE_LONG.is_match("15 Jan 2024"));
        assert!(DATE_LONG.is_match("3-March-2024"));
    }
}

//! Amount parsing and formatting.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use super::patterns::{CURRENCY_TOKEN, GROUPED_COMMA, GROUPED_DOT, NUMBER_TEXT};
use crate::sheet::Cell;

/// Parse an amount written as text.
///
/// Accepts Arabic-Indic digits, the Arabic decimal (`٫`) and thousands (`٬`)
/// separators, currency tokens, accounting negatives `(100)` and either `,`
/// or `.` as the decimal separator. When both appear, the last one is the
/// decimal separator.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let without_currency = CURRENCY_TOKEN.replace_all(s, "");
    let mut cleaned: String = without_currency
        .chars()
        .filter_map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from_digit(c as u32 - 0x0660, 10),
            '\u{06F0}'..='\u{06F9}' => char::from_digit(c as u32 - 0x06F0, 10),
            '\u{066B}' => Some('.'),
            '\u{066C}' | '\u{060C}' => Some(','),
            '\u{2212}' => Some('-'),
            c if c.is_whitespace() || c == '\'' => None,
            c => Some(c),
        })
        .collect();

    let negative_parens = cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative_parens {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }
    let cleaned = cleaned.trim_end_matches(['.', ',']);

    if !NUMBER_TEXT.is_match(cleaned) {
        return None;
    }

    let normalized = normalize_separators(cleaned);
    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative_parens { -value } else { value })
}

fn normalize_separators(s: &str) -> String {
    let comma = s.rfind(',');
    let dot = s.rfind('.');
    match (comma, dot) {
        (Some(c), Some(d)) if c > d => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) if GROUPED_COMMA.is_match(s) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        (None, Some(_)) if GROUPED_DOT.is_match(s) => s.replace('.', ""),
        _ => s.to_string(),
    }
}

/// Numeric value of a cell: numbers directly, text through [`parse_amount`].
/// `Ok(None)` means the cell is blank; `Err` carries the offending text.
pub fn cell_amount(cell: &Cell) -> Result<Option<Decimal>, String> {
    match cell {
        Cell::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| Decimal::from_f64(*n))
            .map(|d| Some(d.normalize()))
            .ok_or_else(|| n.to_string()),
        Cell::Empty => Ok(None),
        c if c.is_blank() => Ok(None),
        Cell::Text(s) if s.trim() == "-" => Ok(None),
        Cell::Text(s) => parse_amount(s).map(Some).ok_or_else(|| s.trim().to_string()),
        Cell::Bool(b) => Err(b.to_string()),
        Cell::Date(d) => Err(d.to_string()),
    }
}

/// Format an amount with a fixed number of decimals (half away from zero)
/// and `,` thousands grouping.
pub fn format_amount(amount: Decimal, decimals: u32) -> String {
    let mut rounded = amount.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }

    let s = rounded.to_string();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };
    let (integer_part, decimal_part) = match digits.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (digits, None),
    };

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::with_capacity(chars.len() + chars.len() / 3);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(*c);
    }

    match decimal_part {
        Some(d) => format!("{}{}.{}", sign, formatted, d),
        None => format!("{}{}", sign, formatted),
    }
}

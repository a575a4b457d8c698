//! Spreadsheet input: a format-neutral grid of cells read from workbooks.

mod reader;

pub use reader::{read_workbook_bytes, read_workbook_path};

use chrono::NaiveDateTime;

use crate::error::SheetError;

/// Result type for spreadsheet operations.
pub type Result<T> = std::result::Result<T, SheetError>;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl Cell {
    /// Whether the cell carries nothing printable.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => is_null_text(s),
            _ => false,
        }
    }

    /// Trimmed text content; numbers print without a trailing `.0`.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let s = s.trim();
                (!is_null_text(s)).then(|| s.to_string())
            }
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Cell::Date(dt) => Some(dt.format("%d/%m/%Y").to_string()),
        }
    }

    /// Numeric content of a numeric cell.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Placeholder strings exports use for empty cells.
fn is_null_text(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("none")
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// One worksheet as a dense grid. Row `i` of `rows` is spreadsheet row `i + 1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Cell at zero-based coordinates, `Empty` when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// All sheets of a workbook, in workbook order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    pub sheets: Vec<Table>,
}

impl Workbook {
    /// Find a sheet by name.
    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|t| t.name == name)
    }
}

//! Error types for the medinv-core library.

use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the medinv library.
#[derive(Error, Debug)]
pub enum MedinvError {
    /// Spreadsheet could not be opened or read.
    #[error("spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    /// Invoice data validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Text shaping error.
    #[error("shaping error: {0}")]
    Shaping(#[from] ShapingError),

    /// Document rendering error.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Document storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Archive bundling error.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to reading spreadsheets.
#[derive(Error, Debug)]
pub enum SheetError {
    /// The workbook could not be opened.
    #[error("failed to open workbook: {0}")]
    Open(String),

    /// A worksheet could not be read.
    #[error("failed to read sheet {sheet}: {reason}")]
    Read { sheet: String, reason: String },

    /// The workbook has no sheets.
    #[error("workbook has no sheets")]
    Empty,
}

/// Problems with the invoice data itself. Row numbers are 1-based, as shown by
/// spreadsheet applications.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// No column-header row was found in the sheet.
    #[error("sheet {sheet}: no item table header (description + qty/unit) found")]
    HeaderNotFound { sheet: String },

    /// A required column is absent.
    #[error("sheet {sheet}: required column '{column}' is missing")]
    MissingColumn { sheet: String, column: String },

    /// A required field is empty on a row.
    #[error("sheet {sheet} row {row}{}: missing {field}", invoice_suffix(.invoice))]
    MissingField {
        sheet: String,
        row: usize,
        field: String,
        invoice: Option<String>,
    },

    /// A numeric field could not be parsed.
    #[error("sheet {sheet} row {row}{}: {field} is not a number: '{value}'", invoice_suffix(.invoice))]
    InvalidNumber {
        sheet: String,
        row: usize,
        field: String,
        value: String,
        invoice: Option<String>,
    },

    /// The sheet's stated grand total disagrees with the sum of its line items.
    #[error("invoice {invoice}: sheet states total {stated} but line items sum to {computed}")]
    TotalMismatch {
        invoice: String,
        stated: Decimal,
        computed: Decimal,
    },

    /// A sheet holding several invoices states a grand total that disagrees
    /// with the sum of all of its rows.
    #[error("sheet {sheet}: states total {stated} but its rows sum to {computed}")]
    SheetTotalMismatch {
        sheet: String,
        stated: Decimal,
        computed: Decimal,
    },
}

fn invoice_suffix(invoice: &Option<String>) -> String {
    invoice
        .as_deref()
        .map(|id| format!(" (invoice {})", id))
        .unwrap_or_default()
}

impl ValidationError {
    /// Invoice identifier the error refers to, if known.
    pub fn invoice(&self) -> Option<&str> {
        match self {
            ValidationError::MissingField { invoice, .. }
            | ValidationError::InvalidNumber { invoice, .. } => invoice.as_deref(),
            ValidationError::TotalMismatch { invoice, .. } => Some(invoice),
            ValidationError::HeaderNotFound { .. }
            | ValidationError::MissingColumn { .. }
            | ValidationError::SheetTotalMismatch { .. } => None,
        }
    }

    /// Whether the error dropped data (row or sheet) rather than only flagging it.
    pub fn is_skip(&self) -> bool {
        !matches!(
            self,
            ValidationError::TotalMismatch { .. } | ValidationError::SheetTotalMismatch { .. }
        )
    }
}

/// Errors related to Arabic shaping and glyph coverage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapingError {
    /// The active font has no glyph for a shaped character.
    #[error("no glyph for U+{:04X} in font {font}", *.ch as u32)]
    UnsupportedGlyph { ch: char, font: String },
}

/// Errors related to PDF assembly.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The PDF object tree could not be written.
    #[error("failed to write PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    /// The finished document could not be serialized.
    #[error("failed to serialize PDF: {0}")]
    Write(String),

    /// The configured font could not be loaded.
    #[error("failed to load font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    /// The configured logo could not be loaded.
    #[error("failed to load logo {path}: {reason}")]
    Logo { path: PathBuf, reason: String },
}

/// Errors related to persisting documents.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing a store file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The index file is not valid JSON.
    #[error("corrupt index {path}: {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The requested document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Another invoice already owns the document file name.
    #[error("{file_name} already belongs to invoice {owner}, refusing to store {id}")]
    NameConflict {
        file_name: String,
        owner: String,
        id: String,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors related to building the download archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The zip writer failed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A stored document could not be read.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Writing archive data failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the medinv library.
pub type Result<T> = std::result::Result<T, MedinvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_name_invoice_and_row() {
        let err = ValidationError::InvalidNumber {
            sheet: "Sheet1".to_string(),
            row: 7,
            field: "unit price".to_string(),
            value: "abc".to_string(),
            invoice: Some("INV1".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "sheet Sheet1 row 7 (invoice INV1): unit price is not a number: 'abc'"
        );
        assert_eq!(err.invoice(), Some("INV1"));
        assert!(err.is_skip());
    }

    #[test]
    fn test_shaping_error_message() {
        let err = ShapingError::UnsupportedGlyph {
            ch: '\u{FEFB}',
            font: "Helvetica".to_string(),
        };
        assert_eq!(err.to_string(), "no glyph for U+FEFB in font Helvetica");
    }
}

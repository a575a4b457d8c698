//! Invoice extraction: spreadsheet rows to normalized invoice records.

mod extractor;
mod inspect;
pub mod rules;

pub use extractor::SheetExtractor;
pub use inspect::{LocatedColumn, RowDump, SheetInspection, column_letter};

use crate::error::ValidationError;
use crate::models::invoice::InvoiceRecord;
use crate::sheet::Workbook;

/// Records extracted from a workbook, with the problems met on the way.
/// Errors are listed in sheet and row order; mismatch diagnostics follow.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<InvoiceRecord>,
    pub errors: Vec<ValidationError>,
}

impl ExtractionOutcome {
    /// Rows or sheets that were dropped.
    pub fn skipped(&self) -> usize {
        self.errors.iter().filter(|e| e.is_skip()).count()
    }
}

/// Trait for invoice extractors.
pub trait InvoiceExtractor {
    /// Extract invoice records from every sheet of a workbook.
    fn extract(&self, workbook: &Workbook) -> ExtractionOutcome;
}

//! Core library for bilingual (Arabic/English) medical invoices.
//!
//! This crate provides:
//! - Spreadsheet reading (xlsx, xls, ods)
//! - Extraction of billing rows into invoice records
//! - Arabic shaping and bidirectional reordering
//! - A fixed A4 invoice layout painted to PDF
//! - A document store with a JSON index and ZIP bundling

pub mod archive;
pub mod batch;
pub mod error;
pub mod extract;
pub mod models;
pub mod render;
pub mod sheet;
pub mod store;
pub mod text;

pub use batch::{BatchFailure, BatchProcessor, BatchProgress, BatchReport};
pub use error::{MedinvError, Result};
pub use extract::{ExtractionOutcome, InvoiceExtractor, SheetExtractor, SheetInspection};
pub use models::config::MedinvConfig;
pub use models::invoice::{InvoiceHeader, InvoiceRecord, LineItem, RenderedDocument, StoredInvoice};
pub use render::{DocumentLayout, FontFace, InvoiceRenderer, PdfRenderer};
pub use sheet::{Workbook, read_workbook_bytes, read_workbook_path};
pub use store::{DocumentStore, FsDocumentStore, MemoryStore};

//! Batch orchestration: workbook -> records -> documents -> store.

use std::path::Path;

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::error::{MedinvError, ValidationError};
use crate::extract::{InvoiceExtractor, SheetExtractor};
use crate::models::config::MedinvConfig;
use crate::models::invoice::StoredInvoice;
use crate::render::{InvoiceRenderer, PdfRenderer};
use crate::sheet::{Workbook, read_workbook_bytes, read_workbook_path};
use crate::store::DocumentStore;

/// An invoice that was extracted but could not be rendered or stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub invoice: String,
    pub reason: String,
}

/// Everything one batch produced and every problem it met.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Workbook name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Index entries of the stored documents, in extraction order.
    pub documents: Vec<StoredInvoice>,

    /// Row and sheet problems from extraction.
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<ValidationError>,

    /// Shaping fallbacks, per invoice and field.
    pub warnings: Vec<String>,

    /// Render and storage failures.
    pub failures: Vec<BatchFailure>,
}

fn serialize_errors<S: Serializer>(errors: &[ValidationError], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(errors.iter().map(ToString::to_string))
}

impl BatchReport {
    /// Rows or sheets dropped during extraction.
    pub fn skipped(&self) -> usize {
        self.errors.iter().filter(|e| e.is_skip()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.failures.is_empty()
    }

    /// Append another report, e.g. from a second workbook.
    pub fn merge(&mut self, other: BatchReport) {
        self.documents.extend(other.documents);
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.failures.extend(other.failures);
    }
}

/// Progress of a running batch: invoices handled so far and the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub done: usize,
    pub total: usize,
}

type ProgressFn<'a> = Box<dyn Fn(BatchProgress) + 'a>;

/// Drives extraction, rendering and storage for whole workbooks.
pub struct BatchProcessor<'a> {
    extractor: Box<dyn InvoiceExtractor + 'a>,
    renderer: Box<dyn InvoiceRenderer + 'a>,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        extractor: impl InvoiceExtractor + 'a,
        renderer: impl InvoiceRenderer + 'a,
    ) -> Self {
        Self {
            extractor: Box::new(extractor),
            renderer: Box::new(renderer),
            progress: None,
        }
    }

    /// Processor with the configured extractor, font, logo and branding.
    pub fn from_config(config: &MedinvConfig) -> Self {
        Self::new(
            SheetExtractor::from_config(config),
            PdfRenderer::from_config(config),
        )
    }

    /// Call `f` after each invoice is handled.
    pub fn with_progress(mut self, f: impl Fn(BatchProgress) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Read a workbook file and process it.
    pub fn process_path(
        &self,
        path: &Path,
        store: &mut dyn DocumentStore,
    ) -> Result<BatchReport, MedinvError> {
        let workbook = read_workbook_path(path)?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(self.process_workbook(&workbook, name.as_deref(), store))
    }

    /// Process an uploaded workbook.
    pub fn process_bytes(
        &self,
        data: Vec<u8>,
        name: Option<&str>,
        store: &mut dyn DocumentStore,
    ) -> Result<BatchReport, MedinvError> {
        let workbook = read_workbook_bytes(data)?;
        Ok(self.process_workbook(&workbook, name, store))
    }

    /// Extract every invoice, render it and save it. Problems with one
    /// invoice never stop the others.
    pub fn process_workbook(
        &self,
        workbook: &Workbook,
        source: Option<&str>,
        store: &mut dyn DocumentStore,
    ) -> BatchReport {
        let outcome = self.extractor.extract(workbook);
        let total = outcome.records.len();
        info!(
            "Processing {} invoice(s) from {}",
            total,
            source.unwrap_or("workbook")
        );

        let mut report = BatchReport {
            source: source.map(str::to_string),
            errors: outcome.errors,
            ..Default::default()
        };

        for (index, record) in outcome.records.iter().enumerate() {
            for issue in record.validate() {
                debug!("Invoice {}: {}", record.id(), issue);
            }
            match self.renderer.render(record) {
                Ok(document) => {
                    report.warnings.extend(document.warnings.iter().cloned());
                    let entry = StoredInvoice::from_rendered(record, &document, source);
                    match store.save(entry, &document.bytes) {
                        Ok(stored) => {
                            debug!("Stored {} as {}", stored.id, stored.file_name);
                            report.documents.push(stored);
                        }
                        Err(e) => {
                            warn!("Failed to store invoice {}: {}", record.id(), e);
                            report.failures.push(BatchFailure {
                                invoice: record.id().to_string(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to render invoice {}: {}", record.id(), e);
                    report.failures.push(BatchFailure {
                        invoice: record.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }

            if let Some(progress) = &self.progress {
                progress(BatchProgress {
                    done: index + 1,
                    total,
                });
            }
        }

        info!(
            "Batch finished: {} stored, {} skipped, {} warning(s), {} failure(s)",
            report.documents.len(),
            report.skipped(),
            report.warnings.len(),
            report.failures.len()
        );
        report
    }
}

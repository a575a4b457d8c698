//! Invoice rendering: fixed A4 layout painted to PDF.

mod fonts;
mod layout;
mod pdf;

pub use fonts::{FontFace, TrueTypeFont};
pub use layout::{Align, Color, DocumentLayout, DrawOp, Layouter, PageLayout};
pub use pdf::{Logo, PdfPainter};

use tracing::{debug, warn};

use crate::error::RenderError;
use crate::models::config::MedinvConfig;
use crate::models::invoice::{InvoiceRecord, RenderedDocument, document_file_name};

/// Result type for rendering.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Trait for turning invoice records into documents.
pub trait InvoiceRenderer {
    /// Render one record.
    fn render(&self, record: &InvoiceRecord) -> Result<RenderedDocument>;
}

/// Renders invoices as PDF with one font, logo and branding.
pub struct PdfRenderer {
    config: MedinvConfig,
    font: FontFace,
    logo: Option<Logo>,
}

impl PdfRenderer {
    /// Renderer with the built-in font and no logo.
    pub fn new(config: MedinvConfig) -> Self {
        Self {
            config,
            font: FontFace::Builtin,
            logo: None,
        }
    }

    /// Renderer with the configured font and logo. A logo that cannot be
    /// decoded is left out.
    pub fn from_config(config: &MedinvConfig) -> Self {
        let font = FontFace::from_config(config);
        let logo = config
            .render
            .logo_path
            .as_deref()
            .and_then(|path| match Logo::load(path) {
                Ok(logo) => Some(logo),
                Err(e) => {
                    warn!("{}; rendering without a logo", e);
                    None
                }
            });
        Self {
            config: config.clone(),
            font,
            logo,
        }
    }

    pub fn with_font(mut self, font: FontFace) -> Self {
        self.font = font;
        self
    }

    pub fn with_logo(mut self, logo: Option<Logo>) -> Self {
        self.logo = logo;
        self
    }

    pub fn font(&self) -> &FontFace {
        &self.font
    }

    /// The display list for a record, without painting it.
    pub fn layout(&self, record: &InvoiceRecord) -> DocumentLayout {
        Layouter::new(&self.font, &self.config)
            .with_logo(self.logo.as_ref().map(Logo::size))
            .layout(record)
    }
}

impl InvoiceRenderer for PdfRenderer {
    fn render(&self, record: &InvoiceRecord) -> Result<RenderedDocument> {
        let layout = self.layout(record);
        let title = format!("Invoice {}", record.id());
        let bytes = PdfPainter::new(&self.font, self.logo.as_ref()).paint(&layout, &title)?;

        debug!(
            "Rendered invoice {} ({} items, {} pages)",
            record.id(),
            record.line_items.len(),
            layout.page_count()
        );

        Ok(RenderedDocument {
            invoice_number: record.id().to_string(),
            file_name: document_file_name(&self.config.storage.file_prefix, record.id()),
            bytes,
            page_count: layout.page_count(),
            total: record.total(),
            displayed_total: layout.displayed_total,
            warnings: layout.warnings,
        })
    }
}

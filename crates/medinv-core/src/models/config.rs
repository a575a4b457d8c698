//! Configuration structures for the invoice pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the medinv pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MedinvConfig {
    /// Column alias configuration.
    pub columns: ColumnConfig,

    /// Spreadsheet extraction configuration.
    pub extraction: ExtractionConfig,

    /// PDF rendering configuration.
    pub render: RenderConfig,

    /// Hospital branding printed on every invoice.
    pub branding: BrandingConfig,

    /// Document store configuration.
    pub storage: StorageConfig,

    /// Web UI configuration.
    pub server: ServerConfig,
}

/// Header aliases used to locate columns. Matching is case-insensitive and
/// ignores surrounding whitespace; an alias matches when the header cell
/// contains it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub invoice_number: Vec<String>,
    pub patient_name: Vec<String>,
    pub date: Vec<String>,
    pub description: Vec<String>,
    pub quantity: Vec<String>,
    pub unit: Vec<String>,
    pub unit_price: Vec<String>,
    pub discount: Vec<String>,
    pub amount: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            invoice_number: strings(&["invoice no", "invoice number", "invoice", "رقم الفاتورة"]),
            patient_name: strings(&["patient name", "patient", "اسم المريض"]),
            date: strings(&["date", "تاريخ"]),
            description: strings(&["description", "service", "item", "البيان", "الوصف"]),
            quantity: strings(&["qty", "quantity", "الكمية"]),
            unit: strings(&["unit", "uom", "الوحدة"]),
            unit_price: strings(&["unit price", "price", "rate", "total", "سعر الوحدة", "السعر"]),
            discount: strings(&["discount", "disc", "الخصم"]),
            amount: strings(&["net amount", "amount", "net", "debit", "القيمة", "المبلغ", "الصافي"]),
        }
    }
}

/// Spreadsheet extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// How many rows from the top are searched for the column-header row.
    pub header_scan_rows: usize,

    /// Labels that end the item table and carry the sheet's grand total.
    pub stop_markers: Vec<String>,

    /// Labels of subtotal rows, which are skipped.
    pub subtotal_markers: Vec<String>,

    /// Largest accepted difference between stated and computed totals.
    pub total_tolerance: f64,

    /// Currency code used when the sheet does not name one.
    pub default_currency: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: 40,
            stop_markers: strings(&["grand total", "الإجمالي العام", "الاجمالي العام"]),
            subtotal_markers: strings(&["total", "إجمالي", "اجمالي"]),
            total_tolerance: 0.01,
            default_currency: "EGP".to_string(),
        }
    }
}

/// PDF rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Explicit TrueType font; takes precedence over the search paths.
    pub font_path: Option<PathBuf>,

    /// Candidate font files, tried in order.
    pub font_search_paths: Vec<PathBuf>,

    /// Decimal places for currency values.
    pub amount_decimals: u32,

    /// Optional PNG/JPEG logo placed in the header.
    pub logo_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_search_paths: vec![
                PathBuf::from("fonts/Arial Unicode.ttf"),
                PathBuf::from("/Library/Fonts/Arial Unicode.ttf"),
                PathBuf::from("/System/Library/Fonts/Supplemental/Arial Unicode.ttf"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
                PathBuf::from("/usr/share/fonts/truetype/noto/NotoSansArabic-Regular.ttf"),
            ],
            amount_decimals: 3,
            logo_path: None,
        }
    }
}

/// Branding printed in the header and footer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingConfig {
    pub hospital_name: String,
    pub address: String,
    pub vat_number: String,
    pub title_en: String,
    pub title_ar: String,
    pub prepared_by: String,
    pub footer_note: String,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            hospital_name: "Andalusia Hospitals Smouha".to_string(),
            address: "35 Bahaa El Din Ghatoury St, Smouha, Alexandria".to_string(),
            vat_number: "202471187".to_string(),
            title_en: "DISCHARGE INVOICE".to_string(),
            title_ar: "فاتورة خروج مريض".to_string(),
            prepared_by: "Ahmed Essam".to_string(),
            footer_note: "الاسترداد النقدى خلال 48 ساعة من أداء الخدمة من 9ص الى 3م عدا الجمعة والعطلات"
                .to_string(),
        }
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the PDFs and the index.
    pub output_dir: PathBuf,

    /// Index file name inside `output_dir`.
    pub index_file: String,

    /// Prefix of generated PDF file names.
    pub file_prefix: String,

    /// File name offered for the bundled archive.
    pub archive_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("invoices"),
            index_file: "invoices_db.json".to_string(),
            file_prefix: "Invoice_".to_string(),
            archive_name: "all_invoices.zip".to_string(),
        }
    }
}

/// Web UI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the web UI listens on.
    pub bind: String,

    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

impl MedinvConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// First usable font file: the explicit path, then the search list.
    pub fn resolve_font(&self) -> Option<PathBuf> {
        self.render
            .font_path
            .iter()
            .chain(self.render.font_search_paths.iter())
            .find(|p| p.is_file())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"render": {"amount_decimals": 2}}"#).unwrap();

        let config = MedinvConfig::from_file(&path).unwrap();
        assert_eq!(config.render.amount_decimals, 2);
        assert_eq!(config.storage.index_file, "invoices_db.json");
        assert_eq!(config.extraction.default_currency, "EGP");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = MedinvConfig::default();
        config.branding.prepared_by = "Reception".to_string();
        config.save(&path).unwrap();

        let loaded = MedinvConfig::from_file(&path).unwrap();
        assert_eq!(loaded.branding.prepared_by, "Reception");
    }

    #[test]
    fn test_invalid_json_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = MedinvConfig::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_resolve_font_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("font.ttf");
        std::fs::write(&font, b"x").unwrap();

        let mut config = MedinvConfig::default();
        config.render.font_path = Some(dir.path().join("missing.ttf"));
        config.render.font_search_paths = vec![font.clone()];
        assert_eq!(config.resolve_font(), Some(font));
    }
}

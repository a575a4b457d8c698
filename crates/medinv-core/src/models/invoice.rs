//! Invoice data models for spreadsheet-sourced medical bills.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One normalized invoice: header metadata plus ordered line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Invoice header information.
    pub header: InvoiceHeader,

    /// Currency code (default: EGP).
    pub currency: String,

    /// Grand total as written in the sheet, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stated_total: Option<Decimal>,

    /// Line items in sheet order.
    pub line_items: Vec<LineItem>,
}

/// Header fields of an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    /// Invoice number/identifier.
    pub invoice_number: String,

    /// Patient (or paying entity) name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,

    /// Invoice date, `DD/MM/YYYY` when it could be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Remaining bilingual-labelled metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<HeaderField, String>,
}

/// Metadata fields printed in the header grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderField {
    VisitNumber,
    FileNumber,
    Physician,
    AdmissionDate,
    DischargeDate,
    Insurer,
    Nationality,
    VatNumber,
    Contract,
    Department,
    RoomNumber,
    InsuranceCard,
}

impl HeaderField {
    pub const ALL: [HeaderField; 12] = [
        HeaderField::VisitNumber,
        HeaderField::FileNumber,
        HeaderField::Physician,
        HeaderField::AdmissionDate,
        HeaderField::DischargeDate,
        HeaderField::Insurer,
        HeaderField::Nationality,
        HeaderField::VatNumber,
        HeaderField::Contract,
        HeaderField::Department,
        HeaderField::RoomNumber,
        HeaderField::InsuranceCard,
    ];

    /// English label as printed on the invoice.
    pub fn label_en(&self) -> &'static str {
        match self {
            HeaderField::VisitNumber => "Visit No",
            HeaderField::FileNumber => "File No",
            HeaderField::Physician => "Physician",
            HeaderField::AdmissionDate => "Admission Date",
            HeaderField::DischargeDate => "Discharge Date",
            HeaderField::Insurer => "Insurer",
            HeaderField::Nationality => "Nationality",
            HeaderField::VatNumber => "VAT No",
            HeaderField::Contract => "Contract",
            HeaderField::Department => "Department",
            HeaderField::RoomNumber => "Room No",
            HeaderField::InsuranceCard => "Insurance Card",
        }
    }

    /// Arabic label as printed on the invoice.
    pub fn label_ar(&self) -> &'static str {
        match self {
            HeaderField::VisitNumber => "رقم الزيارة",
            HeaderField::FileNumber => "رقم الملف",
            HeaderField::Physician => "الطبيب المعالج",
            HeaderField::AdmissionDate => "تاريخ الدخول",
            HeaderField::DischargeDate => "تاريخ الخروج",
            HeaderField::Insurer => "المؤمن",
            HeaderField::Nationality => "الجنسية",
            HeaderField::VatNumber => "التسجيل الضريبي",
            HeaderField::Contract => "التعاقد",
            HeaderField::Department => "القسم",
            HeaderField::RoomNumber => "رقم الغرفة",
            HeaderField::InsuranceCard => "رقم الكارت",
        }
    }

    /// Lowercase label fragments recognised in the sheet's metadata block.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            HeaderField::VisitNumber => &["visit no", "visit number", "visit", "رقم الزيارة"],
            HeaderField::FileNumber => &["file no", "file number", "mrn", "رقم الملف"],
            HeaderField::Physician => &["physician", "doctor", "الطبيب"],
            HeaderField::AdmissionDate => &["admission", "تاريخ الدخول"],
            HeaderField::DischargeDate => &["discharge", "تاريخ الخروج"],
            HeaderField::Insurer => &["insurer", "insurance company", "المؤمن", "شركة التأمين"],
            HeaderField::Nationality => &["nationality", "الجنسية"],
            HeaderField::VatNumber => &["vat no", "tax id", "التسجيل الضريبي"],
            HeaderField::Contract => &["contract", "التعاقد"],
            HeaderField::Department => &["department", "dept", "القسم"],
            HeaderField::RoomNumber => &["room", "رقم الغرفة"],
            HeaderField::InsuranceCard => &["insurance card", "card no", "رقم الكارت"],
        }
    }

    /// Stable key used in JSON metadata maps.
    pub fn key(&self) -> &'static str {
        match self {
            HeaderField::VisitNumber => "visit_number",
            HeaderField::FileNumber => "file_number",
            HeaderField::Physician => "physician",
            HeaderField::AdmissionDate => "admission_date",
            HeaderField::DischargeDate => "discharge_date",
            HeaderField::Insurer => "insurer",
            HeaderField::Nationality => "nationality",
            HeaderField::VatNumber => "vat_number",
            HeaderField::Contract => "contract",
            HeaderField::Department => "department",
            HeaderField::RoomNumber => "room_number",
            HeaderField::InsuranceCard => "insurance_card",
        }
    }

    /// Whether the field holds a date that should be normalized.
    pub fn is_date(&self) -> bool {
        matches!(self, HeaderField::AdmissionDate | HeaderField::DischargeDate)
    }
}

/// Position of a cell row in the source workbook (1-based row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRef {
    pub sheet: String,
    pub row: usize,
}

/// A single billable line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Service description in logical order; may be Arabic or mixed.
    pub description: String,

    /// Section heading the item was listed under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Quantity.
    pub quantity: Decimal,

    /// Unit of measure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Service date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Price per unit.
    pub unit_price: Decimal,

    /// Discount taken off the line.
    pub discount: Decimal,

    /// Line amount.
    pub amount: Decimal,

    /// Where the item came from.
    pub source: RowRef,
}

impl LineItem {
    /// `quantity x unit_price - discount`, or `None` when it overflows.
    pub fn computed_amount(
        quantity: Decimal,
        unit_price: Decimal,
        discount: Decimal,
    ) -> Option<Decimal> {
        quantity.checked_mul(unit_price)?.checked_sub(discount)
    }
}

impl InvoiceRecord {
    /// Create an empty record.
    pub fn new(invoice_number: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            header: InvoiceHeader {
                invoice_number: invoice_number.into(),
                ..InvoiceHeader::default()
            },
            currency: currency.into(),
            stated_total: None,
            line_items: Vec::new(),
        }
    }

    /// Invoice identifier.
    pub fn id(&self) -> &str {
        &self.header.invoice_number
    }

    /// Sum of the line-item amounts. The extractor refuses items that would
    /// overflow it; hand-built records saturate instead of panicking.
    pub fn total(&self) -> Decimal {
        self.line_items
            .iter()
            .fold(Decimal::ZERO, |acc, i| acc.saturating_add(i.amount))
    }

    /// Sum of the line-item amounts, `None` on overflow.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.line_items
            .iter()
            .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.amount))
    }

    /// Header metadata as a flat string map, for indexes and JSON output.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("invoice_number".to_string(), self.header.invoice_number.clone());
        if let Some(name) = &self.header.patient_name {
            map.insert("patient_name".to_string(), name.clone());
        }
        if let Some(date) = &self.header.date {
            map.insert("date".to_string(), date.clone());
        }
        for (field, value) in &self.header.fields {
            map.insert(field.key().to_string(), value.clone());
        }
        map
    }

    /// Check the record and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.header.invoice_number.trim().is_empty() {
            issues.push("Missing invoice number".to_string());
        }

        if self.header.patient_name.is_none() {
            issues.push("Missing patient name".to_string());
        }

        if self.line_items.is_empty() {
            issues.push("No line items".to_string());
        }

        for item in &self.line_items {
            if item.quantity < Decimal::ZERO {
                issues.push(format!(
                    "Negative quantity on {} row {}",
                    item.source.sheet, item.source.row
                ));
            }
        }

        issues
    }
}

/// A finished PDF invoice, before it is handed to the store.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Invoice identifier the document belongs to.
    pub invoice_number: String,

    /// Deterministic file name, see [`document_file_name`].
    pub file_name: String,

    /// PDF bytes.
    pub bytes: Vec<u8>,

    /// Number of pages.
    pub page_count: usize,

    /// Computed total of the record.
    pub total: Decimal,

    /// Total exactly as printed.
    pub displayed_total: String,

    /// Fields drawn unshaped because the font lacks glyphs.
    pub warnings: Vec<String>,
}

/// Index entry of a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredInvoice {
    /// Store key: the invoice identifier.
    pub id: String,

    pub invoice_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    pub total: Decimal,

    pub currency: String,

    /// Workbook file the invoice was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    /// Sheets the line items came from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_sheets: Vec<String>,

    pub file_name: String,

    pub page_count: usize,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    pub stored_at: DateTime<Utc>,
}

impl StoredInvoice {
    /// Build an index entry for a rendered record.
    pub fn from_rendered(
        record: &InvoiceRecord,
        document: &RenderedDocument,
        source_file: Option<&str>,
    ) -> Self {
        let mut sheets: Vec<String> = Vec::new();
        for item in &record.line_items {
            if !sheets.contains(&item.source.sheet) {
                sheets.push(item.source.sheet.clone());
            }
        }

        Self {
            id: record.id().to_string(),
            invoice_number: record.header.invoice_number.clone(),
            patient_name: record.header.patient_name.clone(),
            date: record.header.date.clone(),
            total: document.total,
            currency: record.currency.clone(),
            source_file: source_file.map(str::to_string),
            source_sheets: sheets,
            file_name: document.file_name.clone(),
            page_count: document.page_count,
            metadata: record.metadata(),
            stored_at: Utc::now(),
        }
    }
}

/// File name for an invoice: `<prefix><id>.pdf`, with path separators
/// replaced by `-` and any other character outside `[A-Za-z0-9._-]` by `_`.
/// When that changes the id, the first 8 hex digits of its SHA-256 are
/// appended so distinct ids never share a file.
pub fn document_file_name(prefix: &str, invoice_id: &str) -> String {
    let id = invoice_id.trim();
    let safe: String = id
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '_',
        })
        .collect();
    let safe = if safe.is_empty() || safe.chars().all(|c| c == '.') {
        "Unknown".to_string()
    } else {
        safe
    };
    if safe == id {
        format!("{}{}.pdf", prefix, safe)
    } else {
        let digest = format!("{:x}", Sha256::digest(id.as_bytes()));
        format!("{}{}_{}.pdf", prefix, safe, &digest[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(amount: i64) -> LineItem {
        LineItem {
            description: "Consultation".to_string(),
            section: None,
            quantity: Decimal::ONE,
            unit: None,
            date: None,
            unit_price: Decimal::new(amount, 0),
            discount: Decimal::ZERO,
            amount: Decimal::new(amount, 0),
            source: RowRef {
                sheet: "Sheet1".to_string(),
                row: 2,
            },
        }
    }

    #[test]
    fn test_total_is_sum_of_amounts() {
        let mut record = InvoiceRecord::new("INV1", "EGP");
        assert_eq!(record.total(), Decimal::ZERO);

        record.line_items.push(item(100));
        record.line_items.push(item(50));
        assert_eq!(record.total(), Decimal::new(150, 0));
    }

    #[test]
    fn test_computed_amount() {
        let amount = LineItem::computed_amount(
            Decimal::new(2, 0),
            Decimal::new(5025, 2),
            Decimal::new(5, 1),
        );
        assert_eq!(amount, Some(Decimal::new(100, 0)));
        assert_eq!(
            LineItem::computed_amount(Decimal::MAX, Decimal::TWO, Decimal::ZERO),
            None
        );
    }

    #[test]
    fn test_total_does_not_panic_on_overflow() {
        let mut record = InvoiceRecord::new("INV1", "EGP");
        record.line_items.push(item(1));
        record.line_items[0].amount = Decimal::MAX;
        record.line_items.push(item(1));
        assert_eq!(record.checked_total(), None);
        assert_eq!(record.total(), Decimal::MAX);
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(document_file_name("Invoice_", "INV1"), "Invoice_INV1.pdf");
        assert_eq!(document_file_name("Invoice_", " INV-1.a "), "Invoice_INV-1.a.pdf");

        let slashed = document_file_name("Invoice_", "2024/15\\3");
        assert!(slashed.starts_with("Invoice_2024-15-3_"));
        assert!(slashed.ends_with(".pdf"));
        assert_eq!(slashed.len(), "Invoice_2024-15-3_".len() + 8 + ".pdf".len());

        assert!(document_file_name("Visit_", "A B:1").starts_with("Visit_A_B_1_"));
        assert!(document_file_name("Invoice_", "..").starts_with("Invoice_Unknown_"));
        assert_eq!(
            document_file_name("Invoice_", "2024/15\\3"),
            slashed,
            "names are deterministic"
        );
    }

    #[test]
    fn test_document_file_name_is_injective() {
        assert_ne!(
            document_file_name("Invoice_", "INV/1"),
            document_file_name("Invoice_", "INV-1")
        );
        assert_ne!(
            document_file_name("Invoice_", "فاتورة"),
            document_file_name("Invoice_", "مريضة")
        );
        assert_ne!(
            document_file_name("Invoice_", "A B"),
            document_file_name("Invoice_", "A_B")
        );
    }

    #[test]
    fn test_metadata_uses_field_keys() {
        let mut record = InvoiceRecord::new("INV1", "EGP");
        record.header.patient_name = Some("Mona Adel".to_string());
        record
            .header
            .fields
            .insert(HeaderField::VisitNumber, "V-77".to_string());

        let meta = record.metadata();
        assert_eq!(meta.get("patient_name").map(String::as_str), Some("Mona Adel"));
        assert_eq!(meta.get("visit_number").map(String::as_str), Some("V-77"));
    }

    #[test]
    fn test_validate_flags_empty_record() {
        let record = InvoiceRecord::new("", "EGP");
        let issues = record.validate();
        assert!(issues.contains(&"Missing invoice number".to_string()));
        assert!(issues.contains(&"No line items".to_string()));
    }

    #[test]
    fn test_aliases_are_lowercase() {
        for field in HeaderField::ALL {
            for alias in field.aliases() {
                assert_eq!(*alias, alias.to_lowercase());
            }
        }
    }
}

//! Labelled metadata in the rows above the item table.

use std::collections::{BTreeMap, HashSet};

use tracing::trace;

use super::columns::normalize_label;
use super::dates::{normalize_date, normalize_date_text};
use crate::models::invoice::HeaderField;
use crate::sheet::{Cell, Table};

/// Cells to the right of a label searched for its value.
const VALUE_SEARCH_WIDTH: usize = 5;

const INVOICE_LABELS: &[&str] = &["invoice no", "invoice number", "invoice #", "رقم الفاتورة"];
const PATIENT_LABELS: &[&str] = &["patient name", "patient", "اسم المريض"];
const DATE_LABELS: &[&str] = &["invoice date", "date", "التاريخ"];

/// Header values found above the item table of one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetMetadata {
    pub invoice_number: Option<String>,
    pub patient_name: Option<String>,
    pub date: Option<String>,
    pub fields: BTreeMap<HeaderField, String>,
}

impl SheetMetadata {
    /// Identifier standing in for a missing invoice-number column: the
    /// invoice number, else the visit number.
    pub fn sheet_invoice_id(&self) -> Option<&str> {
        self.invoice_number
            .as_deref()
            .or_else(|| self.fields.get(&HeaderField::VisitNumber).map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.invoice_number.is_none()
            && self.patient_name.is_none()
            && self.date.is_none()
            && self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Label {
    Invoice,
    Patient,
    Date,
    Field(HeaderField),
}

fn contains_any(text: &str, labels: &[&str]) -> bool {
    labels.iter().any(|l| text.contains(l))
}

/// Classify a cell's text as a metadata label. Specific labels are tried
/// before the generic date label so that "Admission Date" is not the date.
fn classify(text: &str) -> Option<Label> {
    if contains_any(text, INVOICE_LABELS) {
        return Some(Label::Invoice);
    }
    if let Some(field) = HeaderField::ALL
        .into_iter()
        .find(|f| contains_any(text, f.aliases()))
    {
        return Some(Label::Field(field));
    }
    if contains_any(text, PATIENT_LABELS) {
        return Some(Label::Patient);
    }
    if contains_any(text, DATE_LABELS) {
        return Some(Label::Date);
    }
    None
}

/// Value written in the label cell itself, as in "Invoice No: 123".
fn inline_value(raw: &str) -> Option<String> {
    let (_, value) = raw.split_once(':')?;
    let value = value.trim();
    (!value.is_empty() && value != "-").then(|| value.to_string())
}

/// Scan rows `0..end_row` for labelled values. The first occurrence of a
/// label wins; cells used as values are never read as labels.
pub fn extract_metadata(table: &Table, end_row: usize) -> SheetMetadata {
    let mut meta = SheetMetadata::default();
    let mut consumed: HashSet<(usize, usize)> = HashSet::new();

    for (row_index, row) in table.rows.iter().take(end_row).enumerate() {
        for (col_index, cell) in row.iter().enumerate() {
            if consumed.contains(&(row_index, col_index)) {
                continue;
            }
            let Some(raw) = cell.text() else { continue };
            let Some(label) = classify(&normalize_label(&raw)) else {
                continue;
            };

            let value = match inline_value(&raw) {
                Some(v) => Some((v, None)),
                None => (col_index + 1..=col_index + VALUE_SEARCH_WIDTH).find_map(|c| {
                    let candidate = table.cell(row_index, c);
                    let text = candidate.text()?;
                    (text != "-").then_some((text, Some(c)))
                }),
            };
            let Some((value, value_col)) = value else { continue };
            if let Some(c) = value_col {
                consumed.insert((row_index, c));
            }

            let value_cell = value_col.map(|c| table.cell(row_index, c));
            trace!("Metadata {:?} = '{}' at row {}", label, value, row_index + 1);
            assign(&mut meta, label, value, value_cell);
        }
    }

    meta
}

fn assign(meta: &mut SheetMetadata, label: Label, value: String, cell: Option<&Cell>) {
    let as_date = |value: String| match cell {
        Some(c) => normalize_date(c).unwrap_or(value),
        None => normalize_date_text(&value),
    };

    match label {
        Label::Invoice => {
            meta.invoice_number.get_or_insert(value);
        }
        Label::Patient => {
            meta.patient_name.get_or_insert(value);
        }
        Label::Date => {
            if meta.date.is_none() {
                meta.date = Some(as_date(value));
            }
        }
        Label::Field(field) => {
            if !meta.fields.contains_key(&field) {
                let value = if field.is_date() { as_date(value) } else { value };
                meta.fields.insert(field, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn sample() -> Table {
        let admission = NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Table::new(
            "Sheet1",
            vec![
                vec![text("Patient Name"), Cell::Empty, text("Mona Adel"), text("اسم المريض")],
                vec![text("Invoice No"), text("-"), text("INV-900")],
                vec![text("Visit No: V-12")],
                vec![text("Admission Date"), Cell::Date(admission), text("Date"), text("15/01/2024")],
                vec![text("Physician"), text("Dr. Hany"), text("الجنسية"), text("مصري")],
                vec![text("Description"), text("Qty")],
            ],
        )
    }

    #[test]
    fn test_extract_metadata_labels() {
        let meta = extract_metadata(&sample(), 5);
        assert_eq!(meta.patient_name.as_deref(), Some("Mona Adel"));
        assert_eq!(meta.invoice_number.as_deref(), Some("INV-900"));
        assert_eq!(meta.date.as_deref(), Some("15/01/2024"));
        assert_eq!(
            meta.fields.get(&HeaderField::VisitNumber).map(String::as_str),
            Some("V-12")
        );
        assert_eq!(
            meta.fields.get(&HeaderField::AdmissionDate).map(String::as_str),
            Some("10/01/2024")
        );
        assert_eq!(
            meta.fields.get(&HeaderField::Physician).map(String::as_str),
            Some("Dr. Hany")
        );
        assert_eq!(
            meta.fields.get(&HeaderField::Nationality).map(String::as_str),
            Some("مصري")
        );
    }

    #[test]
    fn test_sheet_invoice_id_prefers_invoice_number() {
        let meta = extract_metadata(&sample(), 5);
        assert_eq!(meta.sheet_invoice_id(), Some("INV-900"));

        let mut visit_only = meta.clone();
        visit_only.invoice_number = None;
        assert_eq!(visit_only.sheet_invoice_id(), Some("V-12"));
    }

    #[test]
    fn test_value_search_is_bounded() {
        let mut row = vec![text("Insurer")];
        row.extend(std::iter::repeat_n(Cell::Empty, 5));
        row.push(text("too far"));
        let table = Table::new("S", vec![row]);
        assert!(extract_metadata(&table, 1).is_empty());
    }
}

//! Data-completeness report for a workbook: what the extractor would see.

use std::collections::BTreeMap;

use serde::Serialize;

use super::SheetExtractor;
use super::rules::{Column, detect_header, extract_metadata};
use crate::sheet::{Cell, Table, Workbook};

/// A located item-table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedColumn {
    pub column: &'static str,
    /// Spreadsheet column letter.
    pub letter: String,
}

/// A spreadsheet row as text, with its 1-based row number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDump {
    pub row: usize,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetInspection {
    pub sheet: String,
    pub row_count: usize,
    pub column_count: usize,
    /// The first rows of the sheet.
    pub preview: Vec<RowDump>,
    /// 1-based header row.
    pub header_row: Option<usize>,
    pub columns: Vec<LocatedColumn>,
    /// Columns the extractor looks for but did not find.
    pub missing: Vec<&'static str>,
    pub metadata: BTreeMap<String, String>,
    /// First item row after the header.
    pub sample_row: Option<RowDump>,
    pub grand_total_row: Option<RowDump>,
}

/// Spreadsheet letter for a zero-based column index: 0 -> A, 27 -> AB.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn dump(table: &Table, row: usize) -> RowDump {
    RowDump {
        row: row + 1,
        cells: table.rows[row]
            .iter()
            .map(|c| c.text().unwrap_or_default())
            .collect(),
    }
}

impl SheetExtractor {
    /// Describe one sheet: a preview of its first `preview_rows` rows, the
    /// detected header and columns, metadata, a sample item row and the
    /// grand-total row.
    pub fn inspect_sheet(&self, table: &Table, preview_rows: usize) -> SheetInspection {
        let preview = (0..table.rows.len().min(preview_rows))
            .map(|row| dump(table, row))
            .collect();

        let mut inspection = SheetInspection {
            sheet: table.name.clone(),
            row_count: table.rows.len(),
            column_count: table.width(),
            preview,
            header_row: None,
            columns: Vec::new(),
            missing: Vec::new(),
            metadata: BTreeMap::new(),
            sample_row: None,
            grand_total_row: None,
        };

        let Some((header, map)) = detect_header(table, self.columns(), self.header_scan_rows())
        else {
            inspection.missing = Column::ALL.iter().map(Column::name).collect();
            return inspection;
        };

        inspection.header_row = Some(header + 1);
        for column in Column::ALL {
            match map.get(column) {
                Some(index) => inspection.columns.push(LocatedColumn {
                    column: column.name(),
                    letter: column_letter(index),
                }),
                None => inspection.missing.push(column.name()),
            }
        }

        let meta = extract_metadata(table, header);
        let mut metadata = BTreeMap::new();
        if let Some(v) = meta.invoice_number {
            metadata.insert("invoice_number".to_string(), v);
        }
        if let Some(v) = meta.patient_name {
            metadata.insert("patient_name".to_string(), v);
        }
        if let Some(v) = meta.date {
            metadata.insert("date".to_string(), v);
        }
        for (field, value) in meta.fields {
            metadata.insert(field.key().to_string(), value);
        }
        inspection.metadata = metadata;

        for row in header + 1..table.rows.len() {
            let cells = &table.rows[row];
            if cells.iter().all(Cell::is_blank) {
                continue;
            }
            if self.is_stop_row(cells) {
                inspection.grand_total_row = Some(dump(table, row));
                break;
            }
            if inspection.sample_row.is_none() {
                inspection.sample_row = Some(dump(table, row));
            }
        }

        inspection
    }

    /// Inspect every sheet of a workbook.
    pub fn inspect(&self, workbook: &Workbook, preview_rows: usize) -> Vec<SheetInspection> {
        workbook
            .sheets
            .iter()
            .map(|t| self.inspect_sheet(t, preview_rows))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }

    #[test]
    fn test_inspect_discharge_sheet() {
        let table = Table::new(
            "Discharge",
            vec![
                vec![text("Patient Name"), text("Mona Adel")],
                vec![text("Visit No"), text("V-77")],
                vec![],
                vec![text("Description"), text("Qty"), text("Total"), text("Debit")],
                vec![text("Medical Services")],
                vec![text("Consultation"), Cell::Number(1.0), Cell::Number(100.0), Cell::Number(100.0)],
                vec![text("Grand Total"), Cell::Empty, Cell::Empty, Cell::Number(100.0)],
            ],
        );
        let inspection = SheetExtractor::new().inspect_sheet(&table, 3);

        assert_eq!(inspection.preview.len(), 3);
        assert_eq!(inspection.header_row, Some(4));
        assert!(inspection.columns.contains(&LocatedColumn {
            column: "amount",
            letter: "D".to_string(),
        }));
        assert!(inspection.missing.contains(&"invoice number"));
        assert_eq!(inspection.metadata.get("patient_name").map(String::as_str), Some("Mona Adel"));
        assert_eq!(inspection.sample_row.as_ref().map(|r| r.row), Some(5));
        assert_eq!(inspection.grand_total_row.as_ref().map(|r| r.row), Some(7));
    }

    #[test]
    fn test_inspect_sheet_without_header() {
        let table = Table::new("Notes", vec![vec![text("hello")]]);
        let inspection = SheetExtractor::new().inspect_sheet(&table, 10);
        assert_eq!(inspection.header_row, None);
        assert_eq!(inspection.missing.len(), Column::ALL.len());
        assert_eq!(inspection.preview[0].cells, vec!["hello".to_string()]);
    }
}

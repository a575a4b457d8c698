//! Workbook loading with calamine (.xlsx, .xlsm, .xls, .ods).

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use chrono::NaiveDateTime;
use tracing::{debug, info, trace};

use super::{Cell, Result, Table, Workbook};
use crate::error::SheetError;

/// Read every sheet of a workbook held in memory.
pub fn read_workbook_bytes(data: Vec<u8>) -> Result<Workbook> {
    if data.is_empty() {
        return Err(SheetError::Open("input is empty".to_string()));
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))
        .map_err(|e| SheetError::Open(e.to_string()))?;

    let names = workbook.sheet_names();
    if names.is_empty() {
        return Err(SheetError::Empty);
    }

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| SheetError::Read {
                sheet: name.clone(),
                reason: e.to_string(),
            })?;
        let table = range_to_table(&name, &range);
        debug!(
            "Sheet '{}': {} rows x {} columns",
            name,
            table.rows.len(),
            table.width()
        );
        sheets.push(table);
    }

    info!("Read workbook with {} sheet(s)", sheets.len());
    Ok(Workbook { sheets })
}

/// Read every sheet of a workbook file.
pub fn read_workbook_path(path: &Path) -> Result<Workbook> {
    let data = std::fs::read(path)
        .map_err(|e| SheetError::Open(format!("{}: {}", path.display(), e)))?;
    read_workbook_bytes(data)
}

/// Copy a calamine range into a grid anchored at A1, so that row and column
/// positions match what a spreadsheet application shows.
fn range_to_table(name: &str, range: &Range<Data>) -> Table {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(convert));
        while matches!(cells.last(), Some(Cell::Empty)) {
            cells.pop();
        }
        rows.push(cells);
    }
    trace!("Sheet '{}' anchored at ({}, {})", name, row_offset, col_offset);

    Table::new(name, rows)
}

fn convert(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => Cell::Date(value),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook as XlsxWorkbook;

    fn fixture() -> Vec<u8> {
        let mut book = XlsxWorkbook::new();
        let sheet = book.add_worksheet();
        sheet.set_name("Billing").unwrap();
        sheet.write_string(1, 1, "Description").unwrap();
        sheet.write_string(1, 2, "Qty").unwrap();
        sheet.write_string(2, 1, "Consultation").unwrap();
        sheet.write_number(2, 2, 2.0).unwrap();

        let other = book.add_worksheet();
        other.set_name("Notes").unwrap();
        other.write_string(0, 0, "nothing here").unwrap();

        book.save_to_buffer().unwrap()
    }

    #[test]
    fn test_reads_all_sheets_in_order() {
        let workbook = read_workbook_bytes(fixture()).unwrap();
        let names: Vec<_> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Billing", "Notes"]);
    }

    #[test]
    fn test_grid_is_anchored_at_a1() {
        let workbook = read_workbook_bytes(fixture()).unwrap();
        let sheet = workbook.sheet("Billing").unwrap();
        assert_eq!(sheet.cell(1, 1), &Cell::Text("Description".to_string()));
        assert_eq!(sheet.cell(2, 2), &Cell::Number(2.0));
        assert_eq!(sheet.cell(0, 0), &Cell::Empty);
    }

    #[test]
    fn test_garbage_input_is_open_error() {
        let err = read_workbook_bytes(b"definitely not a workbook".to_vec()).unwrap_err();
        assert!(matches!(err, SheetError::Open(_)));

        let err = read_workbook_bytes(Vec::new()).unwrap_err();
        assert!(matches!(err, SheetError::Open(_)));
    }

    #[test]
    fn test_reads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        std::fs::write(&path, fixture()).unwrap();
        let workbook = read_workbook_path(&path).unwrap();
        assert_eq!(workbook.sheets.len(), 2);
    }
}

//! Sheet extractor: groups item rows into invoice records.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::{debug, info, trace, warn};

use crate::error::ValidationError;
use crate::models::config::{ColumnConfig, MedinvConfig};
use crate::models::invoice::{InvoiceRecord, LineItem, RowRef};
use crate::sheet::{Cell, Table, Workbook};

use super::rules::{
    ColumnMap, SheetMetadata, cell_amount, detect_header, extract_metadata, normalize_date,
    normalize_label,
};
use super::{ExtractionOutcome, InvoiceExtractor};

/// Extractor for billing sheets: a metadata block, a column-header row and
/// item rows, optionally closed by a grand-total row.
#[derive(Debug, Clone)]
pub struct SheetExtractor {
    /// Column header aliases.
    columns: ColumnConfig,
    /// Rows searched for the header.
    header_scan_rows: usize,
    /// Normalized stop markers.
    stop_markers: Vec<String>,
    /// Normalized subtotal markers.
    subtotal_markers: Vec<String>,
    /// Accepted stated/computed total difference.
    total_tolerance: Decimal,
    /// Currency for every record.
    currency: String,
}

impl SheetExtractor {
    /// Create an extractor with default settings.
    pub fn new() -> Self {
        Self::from_config(&MedinvConfig::default())
    }

    /// Create an extractor from the pipeline configuration.
    pub fn from_config(config: &MedinvConfig) -> Self {
        let extraction = &config.extraction;
        Self {
            columns: config.columns.clone(),
            header_scan_rows: extraction.header_scan_rows,
            stop_markers: normalize_all(&extraction.stop_markers),
            subtotal_markers: normalize_all(&extraction.subtotal_markers),
            total_tolerance: Decimal::from_f64(extraction.total_tolerance)
                .unwrap_or(Decimal::new(1, 2)),
            currency: extraction.default_currency.clone(),
        }
    }

    /// Set column aliases.
    pub fn with_columns(mut self, columns: ColumnConfig) -> Self {
        self.columns = columns;
        self
    }

    /// Set the accepted difference between stated and computed totals.
    pub fn with_total_tolerance(mut self, tolerance: Decimal) -> Self {
        self.total_tolerance = tolerance;
        self
    }

    /// Set the currency code.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Set how many rows are searched for the header.
    pub fn with_header_scan_rows(mut self, rows: usize) -> Self {
        self.header_scan_rows = rows;
        self
    }

    pub fn columns(&self) -> &ColumnConfig {
        &self.columns
    }

    pub fn header_scan_rows(&self) -> usize {
        self.header_scan_rows
    }

    /// Whether a row carries a grand-total marker.
    pub(crate) fn is_stop_row(&self, row: &[Cell]) -> bool {
        row.iter()
            .filter_map(Cell::text)
            .map(|t| normalize_label(&t))
            .any(|t| self.stop_markers.iter().any(|m| t.contains(m.as_str())))
    }

    fn is_subtotal(&self, description: &str) -> bool {
        let text = normalize_label(description);
        self.subtotal_markers.iter().any(|m| text.contains(m.as_str()))
    }

    /// Stated grand total on a stop row: the amount column, else the last
    /// numeric cell of the row.
    fn stated_total(&self, table: &Table, row: usize, columns: &ColumnMap) -> Option<Decimal> {
        if let Ok(Some(value)) = cell_amount(pick(table, row, columns.amount)) {
            return Some(value);
        }
        table.rows[row]
            .iter()
            .rev()
            .find_map(|cell| cell_amount(cell).ok().flatten())
    }

    /// Attach a sheet's stated grand total. A sheet holding one invoice
    /// credits it to that record; a sheet holding several is checked
    /// against the sum of its own rows.
    fn credit_stated_total(
        &self,
        sheet: &str,
        stated: Decimal,
        seen_here: &HashSet<String>,
        sheet_sum: Option<Decimal>,
        groups: &mut Grouper,
        errors: &mut Vec<ValidationError>,
    ) {
        if seen_here.len() == 1 {
            let Some(record) = seen_here.iter().next().and_then(|id| groups.get_mut(id)) else {
                return;
            };
            debug!("Sheet '{}': grand total {} for {}", sheet, stated, record.id());
            record.stated_total = match record.stated_total {
                None => Some(stated),
                Some(previous) => previous.checked_add(stated),
            };
            if record.stated_total.is_none() {
                warn!("Invoice {}: stated totals out of range, not checked", record.id());
            }
            return;
        }

        let Some(computed) = sheet_sum else {
            warn!("Sheet '{}': row sum out of range, grand total not checked", sheet);
            return;
        };
        debug!(
            "Sheet '{}': grand total {} across {} invoice(s)",
            sheet,
            stated,
            seen_here.len()
        );
        if self.exceeds_tolerance(stated, computed) {
            warn!(
                "Sheet '{}': stated total {} differs from row sum {}",
                sheet, stated, computed
            );
            errors.push(ValidationError::SheetTotalMismatch {
                sheet: sheet.to_string(),
                stated,
                computed,
            });
        }
    }

    fn exceeds_tolerance(&self, stated: Decimal, computed: Decimal) -> bool {
        stated
            .checked_sub(computed)
            .is_none_or(|diff| diff.abs() > self.total_tolerance)
    }

    fn extract_sheet(
        &self,
        table: &Table,
        groups: &mut Grouper,
        errors: &mut Vec<ValidationError>,
    ) {
        let sheet = table.name.clone();

        let Some((header_row, columns)) =
            detect_header(table, &self.columns, self.header_scan_rows)
        else {
            warn!("Sheet '{}': no item table header found, skipping", sheet);
            errors.push(ValidationError::HeaderNotFound { sheet });
            return;
        };
        debug!("Sheet '{}': header at row {}", sheet, header_row + 1);

        let meta = extract_metadata(table, header_row);
        let sheet_id = meta.sheet_invoice_id().map(str::to_string);

        if columns.invoice_number.is_none() && sheet_id.is_none() {
            warn!("Sheet '{}': no invoice number column or label, skipping", sheet);
            errors.push(ValidationError::MissingColumn {
                sheet,
                column: "invoice number".to_string(),
            });
            return;
        }
        if columns.unit_price.is_none() && columns.amount.is_none() {
            warn!("Sheet '{}': no price or amount column, skipping", sheet);
            errors.push(ValidationError::MissingColumn {
                sheet,
                column: "unit price".to_string(),
            });
            return;
        }

        let mut section: Option<String> = None;
        let mut seen_here: HashSet<String> = HashSet::new();
        let mut sheet_sum = Some(Decimal::ZERO);

        // A sheet that names its invoice yields it even without item rows.
        if columns.invoice_number.is_none() {
            if let Some(id) = &sheet_id {
                let record = groups.entry(id, &self.currency);
                if seen_here.insert(id.clone()) {
                    apply_metadata(record, &meta, sheet_id.as_deref());
                }
            }
        }

        for row_index in header_row + 1..table.rows.len() {
            let row_number = row_index + 1;
            let row = &table.rows[row_index];

            if row.iter().all(Cell::is_blank) {
                continue;
            }

            if self.is_stop_row(row) {
                match self.stated_total(table, row_index, &columns) {
                    Some(value) => {
                        self.credit_stated_total(&sheet, value, &seen_here, sheet_sum, groups, errors)
                    }
                    None => debug!("Sheet '{}': grand total row {} ignored", sheet, row_number),
                }
                break;
            }

            let description = pick(table, row_index, columns.description).text();
            let quantity = cell_amount(pick(table, row_index, columns.quantity));
            let unit_price = cell_amount(pick(table, row_index, columns.unit_price));
            let discount = cell_amount(pick(table, row_index, columns.discount));
            let amount = cell_amount(pick(table, row_index, columns.amount));
            let has_numbers = [&quantity, &unit_price, &discount, &amount]
                .iter()
                .any(|r| !matches!(r, Ok(None)));

            if let Some(desc) = &description {
                if matches!(quantity, Ok(None)) && self.is_subtotal(desc) {
                    trace!("Sheet '{}' row {}: subtotal skipped", sheet, row_number);
                    continue;
                }
                if !has_numbers {
                    trace!("Sheet '{}' row {}: section '{}'", sheet, row_number, desc);
                    section = Some(desc.clone());
                    continue;
                }
            }

            let invoice_id = pick(table, row_index, columns.invoice_number)
                .text()
                .or_else(|| sheet_id.clone());

            let Some(description) = description else {
                if has_numbers {
                    warn!("Sheet '{}' row {}: amounts without description", sheet, row_number);
                    errors.push(ValidationError::MissingField {
                        sheet: sheet.clone(),
                        row: row_number,
                        field: "description".to_string(),
                        invoice: invoice_id,
                    });
                }
                continue;
            };

            let Some(invoice_id) = invoice_id else {
                warn!("Sheet '{}' row {}: no invoice number", sheet, row_number);
                errors.push(ValidationError::MissingField {
                    sheet: sheet.clone(),
                    row: row_number,
                    field: "invoice number".to_string(),
                    invoice: None,
                });
                continue;
            };

            let numbers = [
                ("quantity", quantity),
                ("unit price", unit_price),
                ("discount", discount),
                ("amount", amount),
            ];
            let mut parsed = [None; 4];
            let mut invalid = None;
            for (slot, (field, result)) in parsed.iter_mut().zip(numbers) {
                match result {
                    Ok(value) => *slot = value,
                    Err(value) => {
                        invalid = Some((field, value));
                        break;
                    }
                }
            }
            if let Some((field, value)) = invalid {
                warn!(
                    "Sheet '{}' row {}: invalid {} '{}', row skipped",
                    sheet, row_number, field, value
                );
                errors.push(ValidationError::InvalidNumber {
                    sheet: sheet.clone(),
                    row: row_number,
                    field: field.to_string(),
                    value,
                    invoice: Some(invoice_id),
                });
                continue;
            }
            let [quantity, unit_price, discount, amount] = parsed;

            let quantity = quantity.unwrap_or(Decimal::ONE);
            let discount = discount.unwrap_or(Decimal::ZERO);
            let priced = match (unit_price, amount) {
                (Some(price), Some(amount)) => Some((price, amount)),
                (Some(price), None) => {
                    LineItem::computed_amount(quantity, price, discount).map(|a| (price, a))
                }
                (None, Some(amount)) if !quantity.is_zero() => amount
                    .checked_add(discount)
                    .and_then(|gross| gross.checked_div(quantity))
                    .map(|price| (price, amount)),
                (None, Some(amount)) => Some((amount, amount)),
                (None, None) => {
                    warn!("Sheet '{}' row {}: no price or amount", sheet, row_number);
                    errors.push(ValidationError::MissingField {
                        sheet: sheet.clone(),
                        row: row_number,
                        field: "unit price".to_string(),
                        invoice: Some(invoice_id),
                    });
                    continue;
                }
            };
            let running = groups.total_of(&invoice_id);
            let Some((unit_price, amount)) = priced.filter(|(_, amount)| {
                running.checked_add(*amount).is_some()
                    && sheet_sum.is_none_or(|sum| sum.checked_add(*amount).is_some())
            }) else {
                warn!(
                    "Sheet '{}' row {}: amount out of range, row skipped",
                    sheet, row_number
                );
                errors.push(ValidationError::InvalidNumber {
                    sheet: sheet.clone(),
                    row: row_number,
                    field: "amount".to_string(),
                    value: format!("{} x {}", quantity, unit_price.or(amount).unwrap_or_default()),
                    invoice: Some(invoice_id),
                });
                continue;
            };
            sheet_sum = sheet_sum.and_then(|sum| sum.checked_add(amount));

            let item = LineItem {
                description,
                section: section.clone(),
                quantity,
                unit: pick(table, row_index, columns.unit).text(),
                date: normalize_date(pick(table, row_index, columns.date)),
                unit_price,
                discount,
                amount,
                source: RowRef {
                    sheet: sheet.clone(),
                    row: row_number,
                },
            };
            trace!("Sheet '{}' row {}: {} -> {}", sheet, row_number, invoice_id, item.amount);

            let record = groups.entry(&invoice_id, &self.currency);
            if seen_here.insert(invoice_id.clone()) {
                apply_metadata(record, &meta, sheet_id.as_deref());
            }
            if record.header.patient_name.is_none() {
                record.header.patient_name = pick(table, row_index, columns.patient_name).text();
            }
            record.line_items.push(item);
        }

        debug!(
            "Sheet '{}': {} invoice(s) touched",
            sheet,
            seen_here.len()
        );
    }
}

impl Default for SheetExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceExtractor for SheetExtractor {
    fn extract(&self, workbook: &Workbook) -> ExtractionOutcome {
        let mut groups = Grouper::default();
        let mut errors = Vec::new();

        for table in &workbook.sheets {
            self.extract_sheet(table, &mut groups, &mut errors);
        }

        let mut records = groups.records;
        for record in &mut records {
            if record.header.date.is_none() {
                record.header.date = record.line_items.iter().find_map(|i| i.date.clone());
            }

            if let Some(stated) = record.stated_total {
                let computed = record.total();
                if self.exceeds_tolerance(stated, computed) {
                    warn!(
                        "Invoice {}: stated total {} differs from computed {}",
                        record.id(),
                        stated,
                        computed
                    );
                    errors.push(ValidationError::TotalMismatch {
                        invoice: record.id().to_string(),
                        stated,
                        computed,
                    });
                }
            }
        }

        info!(
            "Extracted {} invoice(s) from {} sheet(s), {} problem(s)",
            records.len(),
            workbook.sheets.len(),
            errors.len()
        );

        ExtractionOutcome { records, errors }
    }
}

/// Records keyed by invoice identifier, kept in order of first appearance.
#[derive(Default)]
struct Grouper {
    records: Vec<InvoiceRecord>,
    index: HashMap<String, usize>,
}

impl Grouper {
    fn entry(&mut self, id: &str, currency: &str) -> &mut InvoiceRecord {
        let position = match self.index.get(id) {
            Some(&position) => position,
            None => {
                self.records.push(InvoiceRecord::new(id, currency));
                self.index.insert(id.to_string(), self.records.len() - 1);
                self.records.len() - 1
            }
        };
        &mut self.records[position]
    }

    /// Running total of an invoice, zero when it has no record yet.
    fn total_of(&self, id: &str) -> Decimal {
        self.index
            .get(id)
            .map_or(Decimal::ZERO, |&position| self.records[position].total())
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut InvoiceRecord> {
        let position = *self.index.get(id)?;
        self.records.get_mut(position)
    }
}

/// Copy sheet metadata into a record. A sheet naming its own invoice only
/// describes that invoice; otherwise it describes every invoice on it.
fn apply_metadata(record: &mut InvoiceRecord, meta: &SheetMetadata, sheet_id: Option<&str>) {
    if sheet_id.is_some_and(|id| id != record.id()) {
        return;
    }
    let header = &mut record.header;
    if header.patient_name.is_none() {
        header.patient_name = meta.patient_name.clone();
    }
    if header.date.is_none() {
        header.date = meta.date.clone();
    }
    for (field, value) in &meta.fields {
        header.fields.entry(*field).or_insert_with(|| value.clone());
    }
}

fn pick(table: &Table, row: usize, column: Option<usize>) -> &Cell {
    table.cell(row, column.unwrap_or(usize::MAX))
}

fn normalize_all(markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .map(|m| normalize_label(m))
        .filter(|m| !m.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::HeaderField;
    use crate::sheet::read_workbook_bytes;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn n(v: f64) -> Cell {
        Cell::Number(v)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn flat_sheet(rows: Vec<Vec<Cell>>) -> Workbook {
        let mut all = vec![vec![
            t("Invoice No"),
            t("Description"),
            t("Qty"),
            t("Unit Price"),
        ]];
        all.extend(rows);
        Workbook {
            sheets: vec![Table::new("Sheet1", all)],
        }
    }

    #[test]
    fn test_rows_with_same_id_form_one_record() {
        let workbook = flat_sheet(vec![
            vec![t("INV1"), t("Consultation"), n(1.0), n(100.0)],
            vec![t("INV1"), t("X-Ray"), n(2.0), n(50.0)],
        ]);

        let outcome = SheetExtractor::new().extract(&workbook);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.records.len(), 1);

        let record = &outcome.records[0];
        assert_eq!(record.id(), "INV1");
        assert_eq!(record.line_items.len(), 2);
        assert_eq!(record.line_items[0].description, "Consultation");
        assert_eq!(record.line_items[1].amount, dec("100"));
        assert_eq!(record.total(), dec("200"));
        assert_eq!(record.currency, "EGP");
    }

    #[test]
    fn test_invalid_price_skips_row_only() {
        let workbook = flat_sheet(vec![
            vec![t("INV1"), t("Consultation"), n(1.0), n(100.0)],
            vec![t("INV1"), t("Dressing"), n(1.0), t("abc")],
            vec![t("INV1"), t("X-Ray"), n(2.0), n(50.0)],
        ]);

        let outcome = SheetExtractor::new().extract(&workbook);
        assert_eq!(
            outcome.errors,
            vec![ValidationError::InvalidNumber {
                sheet: "Sheet1".to_string(),
                row: 3,
                field: "unit price".to_string(),
                value: "abc".to_string(),
                invoice: Some("INV1".to_string()),
            }]
        );
        assert_eq!(outcome.skipped(), 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].line_items.len(), 2);
        assert_eq!(outcome.records[0].total(), dec("200"));
    }

    #[test]
    fn test_records_follow_first_appearance() {
        let workbook = flat_sheet(vec![
            vec![t("B-2"), t("Lab"), n(1.0), n(10.0)],
            vec![t("A-1"), t("Scan"), n(1.0), n(20.0)],
            vec![t("B-2"), t("Pharmacy"), n(3.0), n(5.0)],
        ]);

        let outcome = SheetExtractor::new().extract(&workbook);
        let ids: Vec<_> = outcome.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["B-2", "A-1"]);

        let b = &outcome.records[0];
        let descriptions: Vec<_> = b.line_items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Lab", "Pharmacy"]);
        assert_eq!(b.total(), dec("25"));
    }

    #[test]
    fn test_missing_id_and_price_are_reported() {
        let workbook = flat_sheet(vec![
            vec![Cell::Empty, t("Consultation"), n(1.0), n(100.0)],
            vec![t("INV1"), t("Consultation"), n(1.0), Cell::Empty],
            vec![t("INV1"), t("Visit"), n(1.0), n(80.0)],
        ]);

        let outcome = SheetExtractor::new().extract(&workbook);
        assert_eq!(outcome.errors.len(), 2);
        assert!(matches!(
            &outcome.errors[0],
            ValidationError::MissingField { row: 2, field, invoice: None, .. } if field == "invoice number"
        ));
        assert!(matches!(
            &outcome.errors[1],
            ValidationError::MissingField { row: 3, field, .. } if field == "unit price"
        ));
        assert_eq!(outcome.records[0].total(), dec("80"));
    }

    #[test]
    fn test_quantity_defaults_to_one_and_discount_applies() {
        let workbook = Workbook {
            sheets: vec![Table::new(
                "Sheet1",
                vec![
                    vec![t("Invoice"), t("Description"), t("Qty"), t("Price"), t("Discount")],
                    vec![t("INV7"), t("Room"), Cell::Empty, n(300.0), n(25.5)],
                ],
            )],
        };

        let outcome = SheetExtractor::new().extract(&workbook);
        let item = &outcome.records[0].line_items[0];
        assert_eq!(item.quantity, Decimal::ONE);
        assert_eq!(item.amount, dec("274.5"));
    }

    fn discharge_sheet(name: &str, grand_total: f64) -> Table {
        Table::new(
            name,
            vec![
                vec![t("Patient Name"), t("Mona Adel"), Cell::Empty, t("Visit No"), t("V-100")],
                vec![t("Invoice No"), t("INV-55"), Cell::Empty, t("Insurer"), t("Misr Insurance")],
                vec![t("Admission Date"), t("2024-01-10")],
                vec![],
                vec![
                    t("Description"),
                    t("Qty"),
                    t("Unit"),
                    t("Date"),
                    t("Total"),
                    t("Discount"),
                    t("Debit"),
                ],
                vec![t("Medical Services")],
                vec![t("Consultation"), n(1.0), t("Each"), t("15/01/2024"), n(100.0), n(0.0), n(100.0)],
                vec![t("ECG"), n(2.0), t("Each"), t("15/01/2024"), n(40.0), n(10.0), n(70.0)],
                vec![t("Total Medical Services"), Cell::Empty, Cell::Empty, Cell::Empty, n(180.0), Cell::Empty, n(170.0)],
                vec![t("مستلزمات طبية")],
                vec![t("شاش معقم"), n(3.0), Cell::Empty, Cell::Empty, n(10.0), Cell::Empty, n(30.0)],
                vec![t("Grand Total"), Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, n(grand_total)],
                vec![t("Ignored after total"), n(1.0), Cell::Empty, Cell::Empty, n(999.0), Cell::Empty, n(999.0)],
            ],
        )
    }

    #[test]
    fn test_discharge_sheet_layout() {
        let workbook = Workbook {
            sheets: vec![discharge_sheet("Visit 100", 200.0)],
        };

        let outcome = SheetExtractor::new().extract(&workbook);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.records.len(), 1);

        let record = &outcome.records[0];
        assert_eq!(record.id(), "INV-55");
        assert_eq!(record.header.patient_name.as_deref(), Some("Mona Adel"));
        assert_eq!(record.header.date.as_deref(), Some("15/01/2024"));
        assert_eq!(
            record.header.fields.get(&HeaderField::AdmissionDate).map(String::as_str),
            Some("10/01/2024")
        );
        assert_eq!(
            record.header.fields.get(&HeaderField::Insurer).map(String::as_str),
            Some("Misr Insurance")
        );
        assert_eq!(record.stated_total, Some(dec("200")));
        assert_eq!(record.total(), dec("200"));

        let sections: Vec<_> = record
            .line_items
            .iter()
            .map(|i| i.section.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(sections, vec!["Medical Services", "Medical Services", "مستلزمات طبية"]);
        assert_eq!(record.line_items[1].unit_price, dec("40"));
        assert_eq!(record.line_items[1].amount, dec("70"));
        assert_eq!(record.line_items[2].quantity, dec("3"));
        assert_eq!(record.line_items[2].source.row, 11);
    }

    #[test]
    fn test_total_mismatch_keeps_record() {
        let workbook = Workbook {
            sheets: vec![discharge_sheet("Visit 100", 250.0)],
        };

        let outcome = SheetExtractor::new().extract(&workbook);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped(), 0);
        assert_eq!(
            outcome.errors,
            vec![ValidationError::TotalMismatch {
                invoice: "INV-55".to_string(),
                stated: dec("250"),
                computed: dec("200"),
            }]
        );
    }

    #[test]
    fn test_same_id_merges_across_sheets() {
        let workbook = Workbook {
            sheets: vec![discharge_sheet("Part 1", 200.0), discharge_sheet("Part 2", 200.0)],
        };

        let outcome = SheetExtractor::new().extract(&workbook);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.line_items.len(), 6);
        assert_eq!(record.line_items[3].source.sheet, "Part 2");
        assert_eq!(record.total(), dec("400"));
        assert_eq!(record.stated_total, Some(dec("400")));
    }

    #[test]
    fn test_bad_sheets_are_skipped() {
        let workbook = Workbook {
            sheets: vec![
                Table::new("Notes", vec![vec![t("just a note")]]),
                Table::new(
                    "NoId",
                    vec![
                        vec![t("Description"), t("Qty"), t("Price")],
                        vec![t("Consultation"), n(1.0), n(10.0)],
                    ],
                ),
                discharge_sheet("Good", 200.0),
            ],
        };

        let outcome = SheetExtractor::new().extract(&workbook);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(
            outcome.errors,
            vec![
                ValidationError::HeaderNotFound {
                    sheet: "Notes".to_string()
                },
                ValidationError::MissingColumn {
                    sheet: "NoId".to_string(),
                    column: "invoice number".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_documents_match_distinct_ids_from_xlsx() {
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        for (col, header) in ["Invoice No", "Description", "Qty", "Unit Price"].iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        let rows = [
            ("INV1", "Consultation", 1.0, 100.0),
            ("INV2", "أشعة", 1.0, 250.0),
            ("INV1", "X-Ray", 2.0, 50.0),
            ("INV3", "Lab", 4.0, 12.5),
        ];
        for (i, (id, desc, qty, price)) in rows.iter().enumerate() {
            let r = i as u32 + 1;
            sheet.write_string(r, 0, *id).unwrap();
            sheet.write_string(r, 1, *desc).unwrap();
            sheet.write_number(r, 2, *qty).unwrap();
            sheet.write_number(r, 3, *price).unwrap();
        }
        let bytes = book.save_to_buffer().unwrap();

        let workbook = read_workbook_bytes(bytes).unwrap();
        let outcome = SheetExtractor::new().extract(&workbook);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[0].total(), dec("200"));
        assert_eq!(outcome.records[1].line_items[0].description, "أشعة");
        assert_eq!(outcome.records[2].total(), dec("50"));
    }

    #[test]
    fn test_flat_sheet_grand_total_covers_all_invoices() {
        let workbook = flat_sheet(vec![
            vec![t("INV1"), t("Consultation"), n(1.0), n(100.0)],
            vec![t("INV2"), t("Dressing"), n(1.0), n(50.0)],
            vec![t("Grand Total"), Cell::Empty, Cell::Empty, n(150.0)],
        ]);

        let outcome = SheetExtractor::new().extract(&workbook);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|r| r.stated_total.is_none()));
    }

    #[test]
    fn test_flat_sheet_grand_total_mismatch_names_sheet() {
        let workbook = flat_sheet(vec![
            vec![t("INV1"), t("Consultation"), n(1.0), n(100.0)],
            vec![t("INV2"), t("Dressing"), n(1.0), n(50.0)],
            vec![t("Grand Total"), Cell::Empty, Cell::Empty, n(175.0)],
        ]);

        let outcome = SheetExtractor::new().extract(&workbook);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(
            outcome.errors,
            vec![ValidationError::SheetTotalMismatch {
                sheet: "Sheet1".to_string(),
                stated: dec("175"),
                computed: dec("150"),
            }]
        );
        assert_eq!(outcome.skipped(), 0);
    }

    #[test]
    fn test_flat_sheet_single_invoice_gets_stated_total() {
        let workbook = flat_sheet(vec![
            vec![t("INV1"), t("Consultation"), n(1.0), n(100.0)],
            vec![t("INV1"), t("X-Ray"), n(2.0), n(50.0)],
            vec![t("Grand Total"), Cell::Empty, Cell::Empty, n(200.0)],
        ]);

        let outcome = SheetExtractor::new().extract(&workbook);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.records[0].stated_total, Some(dec("200")));
    }

    #[test]
    fn test_labelled_sheet_without_items_yields_empty_record() {
        let workbook = Workbook {
            sheets: vec![Table::new(
                "Visit 7",
                vec![
                    vec![t("Invoice No"), t("INV-7")],
                    vec![],
                    vec![t("Description"), t("Qty"), t("Unit Price")],
                    vec![t("Grand Total"), Cell::Empty, n(0.0)],
                ],
            )],
        };

        let outcome = SheetExtractor::new().extract(&workbook);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.id(), "INV-7");
        assert!(record.line_items.is_empty());
        assert_eq!(record.total(), Decimal::ZERO);
        assert_eq!(record.stated_total, Some(Decimal::ZERO));
    }

    #[test]
    fn test_huge_amounts_skip_row_without_panicking() {
        let workbook = flat_sheet(vec![
            vec![t("INV1"), t("Consultation"), n(1e15), n(1e15)],
            vec![t("INV2"), t("Dressing"), n(3.0), n(10.0)],
            vec![t("INV3"), t("Surgery"), n(1.0), n(7e28)],
            vec![t("INV3"), t("Implant"), n(1.0), n(7e28)],
        ]);

        let outcome = SheetExtractor::new().extract(&workbook);
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["INV2", "INV3"]);
        assert_eq!(outcome.records[0].total(), dec("30"));
        assert_eq!(outcome.records[1].line_items.len(), 1);

        let skipped_rows: Vec<usize> = outcome
            .errors
            .iter()
            .filter_map(|e| match e {
                ValidationError::InvalidNumber { row, field, .. } if field == "amount" => Some(*row),
                _ => None,
            })
            .collect();
        assert_eq!(skipped_rows, vec![2, 5]);
    }
}

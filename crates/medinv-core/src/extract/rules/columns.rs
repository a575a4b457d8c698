//! Item-table header detection and column mapping.

use tracing::trace;

use super::patterns::WHITESPACE;
use crate::models::config::ColumnConfig;
use crate::sheet::Table;

/// Logical columns of the item table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    InvoiceNumber,
    PatientName,
    Date,
    Description,
    Quantity,
    Unit,
    UnitPrice,
    Discount,
    Amount,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::InvoiceNumber,
        Column::PatientName,
        Column::Date,
        Column::Description,
        Column::Quantity,
        Column::Unit,
        Column::UnitPrice,
        Column::Discount,
        Column::Amount,
    ];

    /// Human-readable name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Column::InvoiceNumber => "invoice number",
            Column::PatientName => "patient name",
            Column::Date => "date",
            Column::Description => "description",
            Column::Quantity => "quantity",
            Column::Unit => "unit",
            Column::UnitPrice => "unit price",
            Column::Discount => "discount",
            Column::Amount => "amount",
        }
    }

    fn aliases<'a>(&self, config: &'a ColumnConfig) -> &'a [String] {
        match self {
            Column::InvoiceNumber => &config.invoice_number,
            Column::PatientName => &config.patient_name,
            Column::Date => &config.date,
            Column::Description => &config.description,
            Column::Quantity => &config.quantity,
            Column::Unit => &config.unit,
            Column::UnitPrice => &config.unit_price,
            Column::Discount => &config.discount,
            Column::Amount => &config.amount,
        }
    }
}

/// Zero-based positions of the located columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub invoice_number: Option<usize>,
    pub patient_name: Option<usize>,
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub quantity: Option<usize>,
    pub unit: Option<usize>,
    pub unit_price: Option<usize>,
    pub discount: Option<usize>,
    pub amount: Option<usize>,
}

impl ColumnMap {
    pub fn get(&self, column: Column) -> Option<usize> {
        match column {
            Column::InvoiceNumber => self.invoice_number,
            Column::PatientName => self.patient_name,
            Column::Date => self.date,
            Column::Description => self.description,
            Column::Quantity => self.quantity,
            Column::Unit => self.unit,
            Column::UnitPrice => self.unit_price,
            Column::Discount => self.discount,
            Column::Amount => self.amount,
        }
    }

    fn set(&mut self, column: Column, index: usize) {
        let slot = match column {
            Column::InvoiceNumber => &mut self.invoice_number,
            Column::PatientName => &mut self.patient_name,
            Column::Date => &mut self.date,
            Column::Description => &mut self.description,
            Column::Quantity => &mut self.quantity,
            Column::Unit => &mut self.unit,
            Column::UnitPrice => &mut self.unit_price,
            Column::Discount => &mut self.discount,
            Column::Amount => &mut self.amount,
        };
        *slot = Some(index);
    }

    /// Whether this looks like an item-table header: a description column
    /// plus a quantity, unit or unit-price column.
    pub fn is_item_header(&self) -> bool {
        self.description.is_some()
            && (self.quantity.is_some() || self.unit.is_some() || self.unit_price.is_some())
    }
}

/// Lowercase, collapse whitespace, drop trailing `:` `.` `#`.
pub fn normalize_label(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lowered, " ");
    collapsed
        .trim_end_matches([':', '.', '#', ' '])
        .trim()
        .to_string()
}

/// How well a header cell matches an alias. Exact matches beat matches at the
/// end of the header (its head noun, as in "Service Date"), which beat any
/// other containment; longer aliases beat shorter ones.
fn match_score(header: &str, alias: &str) -> Option<usize> {
    let alias = normalize_label(alias);
    if alias.is_empty() {
        return None;
    }
    if header == alias {
        Some(2000 + alias.len())
    } else if header.ends_with(&alias) {
        Some(1000 + alias.len())
    } else if header.contains(&alias) {
        Some(alias.len())
    } else {
        None
    }
}

/// Map the cells of one row to logical columns.
pub fn map_columns(cells: &[Option<String>], config: &ColumnConfig) -> ColumnMap {
    let mut candidates: Vec<(usize, usize, Column)> = Vec::new();
    for (index, cell) in cells.iter().enumerate() {
        let Some(text) = cell else { continue };
        let header = normalize_label(text);
        if header.is_empty() {
            continue;
        }
        // A cell only competes for the column it matches best.
        let mut best: Option<(usize, Column)> = None;
        for column in Column::ALL {
            let score = column
                .aliases(config)
                .iter()
                .filter_map(|alias| match_score(&header, alias))
                .max();
            if let Some(score) = score {
                if best.is_none_or(|(top, _)| score > top) {
                    best = Some((score, column));
                }
            }
        }
        if let Some((score, column)) = best {
            candidates.push((score, index, column));
        }
    }

    // Highest score first; ties go to the leftmost cell.
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut map = ColumnMap::default();
    let mut used_cells = Vec::new();
    for (score, index, column) in candidates {
        if map.get(column).is_some() || used_cells.contains(&index) {
            continue;
        }
        trace!("Column '{}' -> {} (score {})", column.name(), index, score);
        map.set(column, index);
        used_cells.push(index);
    }
    map
}

/// Find the item-table header within the first `scan_rows` rows.
/// Returns the zero-based row index and the column mapping.
pub fn detect_header(
    table: &Table,
    config: &ColumnConfig,
    scan_rows: usize,
) -> Option<(usize, ColumnMap)> {
    table
        .rows
        .iter()
        .take(scan_rows)
        .enumerate()
        .find_map(|(row_index, row)| {
            let cells: Vec<Option<String>> = row.iter().map(|c| c.text()).collect();
            let map = map_columns(&cells, config);
            map.is_item_header().then_some((row_index, map))
        })
}

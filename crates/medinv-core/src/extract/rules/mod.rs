//! Cell-level rules: numbers, dates, column headers and metadata labels.

pub mod amounts;
pub mod columns;
pub mod dates;
pub mod metadata;
pub mod patterns;

pub use amounts::{cell_amount, format_amount, parse_amount};
pub use columns::{Column, ColumnMap, detect_header, map_columns, normalize_label};
pub use dates::{DATE_FORMAT, normalize_date, normalize_date_text, parse_date};
pub use metadata::{SheetMetadata, extract_metadata};

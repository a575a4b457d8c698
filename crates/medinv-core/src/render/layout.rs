//! Fixed A4 invoice layout as a display list.
//!
//! Coordinates are PDF user space: points, origin at the bottom-left corner
//! of the page. Text in a [`DrawOp::Text`] is already in visual order.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::fonts::FontFace;
use crate::extract::rules::format_amount;
use crate::models::config::MedinvConfig;
use crate::models::invoice::{HeaderField, InvoiceRecord, LineItem};
use crate::text::display_text;

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const MARGIN: f32 = 36.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

/// Logo box: 5cm x 2.5cm.
const LOGO_BOX: (f32, f32) = (141.73, 70.87);

const HEADER_ROW_HEIGHT: f32 = 26.0;
const ITEM_ROW_HEIGHT: f32 = 16.0;
const TOTAL_ROW_HEIGHT: f32 = 20.0;
const GRID_ROW_HEIGHT: f32 = 16.0;
const CELL_PADDING: f32 = 3.0;
/// Lowest y the item table may reach; the footer lives below it.
const TABLE_FLOOR: f32 = MARGIN + 44.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color(pub f32, pub f32, pub f32);

impl Color {
    pub const BLACK: Color = Color(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color(1.0, 1.0, 1.0);
    /// Hospital red, #A6192E.
    pub const ACCENT: Color = Color(0.651, 0.098, 0.180);
    /// #E0E0E0
    pub const SHADE: Color = Color(0.878, 0.878, 0.878);
    /// #B0B0B0
    pub const GRID: Color = Color(0.690, 0.690, 0.690);
    pub const MUTED: Color = Color(0.35, 0.35, 0.35);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// One drawing instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        color: Color,
        text: String,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
    },
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
        line_width: f32,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Color,
        line_width: f32,
    },
    /// The logo image, scaled into the given box.
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub ops: Vec<DrawOp>,
}

/// A fully laid-out invoice, ready to paint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentLayout {
    pub pages: Vec<PageLayout>,
    /// Grand total as printed.
    pub displayed_total: String,
    pub warnings: Vec<String>,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All text drawn on a page, in drawing order.
    pub fn page_text(&self, page: usize) -> Vec<&str> {
        self.pages
            .get(page)
            .map(|p| {
                p.ops
                    .iter()
                    .filter_map(|op| match op {
                        DrawOp::Text { text, .. } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct TableColumn {
    label_en: &'static str,
    label_ar: &'static str,
    width: f32,
    align: Align,
}

const TABLE_COLUMNS: [TableColumn; 7] = [
    TableColumn { label_en: "Description", label_ar: "البيان", width: 183.28, align: Align::Left },
    TableColumn { label_en: "Qty", label_ar: "الكمية", width: 40.0, align: Align::Right },
    TableColumn { label_en: "Unit", label_ar: "الوحدة", width: 45.0, align: Align::Center },
    TableColumn { label_en: "Date", label_ar: "التاريخ", width: 60.0, align: Align::Center },
    TableColumn { label_en: "Unit Price", label_ar: "سعر الوحدة", width: 65.0, align: Align::Right },
    TableColumn { label_en: "Discount", label_ar: "الخصم", width: 60.0, align: Align::Right },
    TableColumn { label_en: "Amount", label_ar: "القيمة", width: 70.0, align: Align::Right },
];

/// A field shown in the metadata grid.
#[derive(Debug, Clone, Copy)]
enum GridField {
    InvoiceNumber,
    PatientName,
    Date,
    Header(HeaderField),
}

impl GridField {
    fn labels(self) -> (&'static str, &'static str) {
        match self {
            GridField::InvoiceNumber => ("Invoice No", "رقم الفاتورة"),
            GridField::PatientName => ("Patient Name", "اسم المريض"),
            GridField::Date => ("Invoice Date", "تاريخ الفاتورة"),
            GridField::Header(field) => (field.label_en(), field.label_ar()),
        }
    }

    fn value(self, record: &InvoiceRecord) -> Option<&str> {
        match self {
            GridField::InvoiceNumber => Some(record.header.invoice_number.as_str()),
            GridField::PatientName => record.header.patient_name.as_deref(),
            GridField::Date => record.header.date.as_deref(),
            GridField::Header(field) => record.header.fields.get(&field).map(String::as_str),
        }
    }
}

const GRID_LEFT: [GridField; 7] = [
    GridField::InvoiceNumber,
    GridField::PatientName,
    GridField::Header(HeaderField::FileNumber),
    GridField::Header(HeaderField::VisitNumber),
    GridField::Header(HeaderField::Nationality),
    GridField::Header(HeaderField::Insurer),
    GridField::Header(HeaderField::Contract),
];

const GRID_RIGHT: [GridField; 7] = [
    GridField::Date,
    GridField::Header(HeaderField::AdmissionDate),
    GridField::Header(HeaderField::DischargeDate),
    GridField::Header(HeaderField::Physician),
    GridField::Header(HeaderField::Department),
    GridField::Header(HeaderField::RoomNumber),
    GridField::Header(HeaderField::InsuranceCard),
];

enum TableRow<'r> {
    Section(&'r str),
    Item(&'r LineItem),
}

/// Pixel size of the logo, when one is configured.
pub type LogoSize = (u32, u32);

/// Lays out invoices with one font and configuration.
pub struct Layouter<'a> {
    font: &'a FontFace,
    config: &'a MedinvConfig,
    logo: Option<LogoSize>,
}

/// Layout state for one invoice.
struct Builder<'a, 'r> {
    font: &'a FontFace,
    config: &'a MedinvConfig,
    record: &'r InvoiceRecord,
    pages: Vec<PageLayout>,
    current: usize,
    warnings: Vec<String>,
    y: f32,
}

impl<'a> Layouter<'a> {
    pub fn new(font: &'a FontFace, config: &'a MedinvConfig) -> Self {
        Self {
            font,
            config,
            logo: None,
        }
    }

    pub fn with_logo(mut self, size: Option<LogoSize>) -> Self {
        self.logo = size;
        self
    }

    /// Lay out one invoice.
    pub fn layout(&self, record: &InvoiceRecord) -> DocumentLayout {
        let mut b = Builder {
            font: self.font,
            config: self.config,
            record,
            pages: vec![PageLayout::default()],
            current: 0,
            warnings: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        };

        b.branding(self.logo);
        b.title();
        b.metadata_grid();
        b.table_header();

        let mut current_section: Option<&str> = None;
        let mut rows = Vec::with_capacity(record.line_items.len());
        for item in &record.line_items {
            let section = item.section.as_deref();
            match section {
                Some(name) if section != current_section => rows.push(TableRow::Section(name)),
                _ => {}
            }
            current_section = section;
            rows.push(TableRow::Item(item));
        }

        for row in rows {
            if b.y - ITEM_ROW_HEIGHT < TABLE_FLOOR {
                b.continuation_page();
            }
            match row {
                TableRow::Section(name) => b.section_row(name),
                TableRow::Item(item) => b.item_row(item),
            }
        }

        if b.y - TOTAL_ROW_HEIGHT < TABLE_FLOOR {
            b.continuation_page();
        }
        let displayed_total = format_amount(record.total(), self.config.render.amount_decimals);
        b.total_row(&displayed_total);
        b.footers();

        debug!(
            "Laid out invoice {} on {} page(s)",
            record.id(),
            b.pages.len()
        );

        DocumentLayout {
            pages: b.pages,
            displayed_total,
            warnings: b.warnings,
        }
    }
}

/// Where a piece of text goes: a horizontal slot on one baseline.
#[derive(Debug, Clone, Copy)]
struct Slot {
    x: f32,
    y: f32,
    width: f32,
    align: Align,
}

impl Slot {
    fn left(x: f32, y: f32, width: f32) -> Self {
        Self { x, y, width, align: Align::Left }
    }

    fn center(x: f32, y: f32, width: f32) -> Self {
        Self { x, y, width, align: Align::Center }
    }

    fn right(x: f32, y: f32, width: f32) -> Self {
        Self { x, y, width, align: Align::Right }
    }

    /// A table cell with padding on both sides.
    fn cell(x: f32, y: f32, width: f32, align: Align) -> Self {
        Self {
            x: x + CELL_PADDING,
            y,
            width: width - 2.0 * CELL_PADDING,
            align,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Style {
    size: f32,
    bold: bool,
    color: Color,
}

impl Style {
    const fn new(size: f32) -> Self {
        Self {
            size,
            bold: false,
            color: Color::BLACK,
        }
    }

    const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    const fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

impl Builder<'_, '_> {
    fn push(&mut self, op: DrawOp) {
        self.pages[self.current].ops.push(op);
    }

    /// Shape and reorder text for drawing, falling back to the logical text
    /// when the font lacks a glyph.
    fn prepare(&mut self, text: &str, field: &str) -> String {
        match display_text(text, self.font) {
            Ok(visual) => visual,
            Err(e) => {
                let warning = format!("invoice {} field {}: {}", self.record.id(), field, e);
                if !self.warnings.contains(&warning) {
                    warn!("{}", warning);
                    self.warnings.push(warning);
                }
                text.to_string()
            }
        }
    }

    /// Prepare text and shorten it with "..." until it fits `max_width`.
    fn fit(&mut self, text: &str, field: &str, style: Style, max_width: f32) -> String {
        let visual = self.prepare(text, field);
        if self.font.text_width(&visual, style.size, style.bold) <= max_width {
            return visual;
        }

        let mut chars: Vec<char> = text.chars().collect();
        while chars.pop().is_some() {
            let shortened = format!("{}...", chars.iter().collect::<String>().trim_end());
            let visual = display_text(&shortened, self.font).unwrap_or(shortened);
            if self.font.text_width(&visual, style.size, style.bold) <= max_width {
                return visual;
            }
        }
        String::new()
    }

    fn text(&mut self, text: &str, field: &str, slot: Slot, style: Style) {
        if text.is_empty() {
            return;
        }
        let visual = self.fit(text, field, style, slot.width);
        let drawn = self.font.text_width(&visual, style.size, style.bold);
        let x = match slot.align {
            Align::Left => slot.x,
            Align::Center => slot.x + (slot.width - drawn) / 2.0,
            Align::Right => slot.x + slot.width - drawn,
        };
        self.push(DrawOp::Text {
            x,
            y: slot.y,
            size: style.size,
            bold: style.bold,
            color: style.color,
            text: visual,
        });
    }

    fn rule(&mut self, y: f32, color: Color, line_width: f32) {
        self.push(DrawOp::Line {
            from: (MARGIN, y),
            to: (PAGE_WIDTH - MARGIN, y),
            color,
            line_width,
        });
    }

    fn branding(&mut self, logo: Option<LogoSize>) {
        let top = self.y;
        let branding = self.config.branding.clone();
        let side = (CONTENT_WIDTH - LOGO_BOX.0) / 2.0 - 6.0;
        let right_x = PAGE_WIDTH - MARGIN - side;

        self.text(
            &branding.hospital_name,
            "hospital name",
            Slot::left(MARGIN, top - 14.0, side),
            Style::new(13.0).bold().color(Color::ACCENT),
        );

        let record = self.record;
        let vat = record
            .header
            .fields
            .get(&HeaderField::VatNumber)
            .unwrap_or(&branding.vat_number);
        self.text(
            &format!("VAT No: {}", vat),
            "vat number",
            Slot::right(right_x, top - 12.0, side),
            Style::new(9.0).bold(),
        );
        self.text(
            &branding.address,
            "address",
            Slot::right(right_x, top - 26.0, side),
            Style::new(8.5).color(Color::MUTED),
        );

        if let Some((w, h)) = logo.filter(|(w, h)| *w > 0 && *h > 0) {
            let scale = (LOGO_BOX.0 / w as f32).min(LOGO_BOX.1 / h as f32);
            let (width, height) = (w as f32 * scale, h as f32 * scale);
            self.push(DrawOp::Image {
                x: (PAGE_WIDTH - width) / 2.0,
                y: top - height,
                width,
                height,
            });
        }

        self.y = top - LOGO_BOX.1 - 6.0;
        self.rule(self.y, Color::ACCENT, 2.0);
    }

    fn title(&mut self) {
        let config = self.config;
        let branding = &config.branding;
        self.y -= 20.0;
        self.text(
            &branding.title_en,
            "title",
            Slot::center(MARGIN, self.y, CONTENT_WIDTH),
            Style::new(15.0).bold(),
        );
        self.y -= 17.0;
        self.text(
            &branding.title_ar,
            "arabic title",
            Slot::center(MARGIN, self.y, CONTENT_WIDTH),
            Style::new(13.0).bold(),
        );
        self.y -= 12.0;
    }

    fn metadata_grid(&mut self) {
        let height = GRID_ROW_HEIGHT * GRID_LEFT.len() as f32;
        let top = self.y;
        let half = CONTENT_WIDTH / 2.0;

        self.push(DrawOp::StrokeRect {
            x: MARGIN,
            y: top - height,
            width: CONTENT_WIDTH,
            height,
            color: Color::GRID,
            line_width: 0.75,
        });
        self.push(DrawOp::Line {
            from: (MARGIN + half, top),
            to: (MARGIN + half, top - height),
            color: Color::GRID,
            line_width: 0.5,
        });

        let record = self.record;
        let label = Style::new(8.0).bold();
        let value_style = Style::new(8.0);
        for (column, fields) in [GRID_LEFT, GRID_RIGHT].iter().enumerate() {
            let x0 = MARGIN + half * column as f32 + CELL_PADDING;
            let inner = half - 2.0 * CELL_PADDING;
            let label_width = inner * 0.3;
            let value_width = inner * 0.4;
            for (i, field) in fields.iter().enumerate() {
                let y = top - GRID_ROW_HEIGHT * (i as f32 + 1.0) + 5.0;
                let (label_en, label_ar) = field.labels();
                let value = field
                    .value(record)
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or("-");
                self.text(label_en, label_en, Slot::left(x0, y, label_width), label);
                self.text(value, label_en, Slot::left(x0 + label_width, y, value_width), value_style);
                self.text(
                    label_ar,
                    label_en,
                    Slot::right(x0 + label_width + value_width, y, label_width),
                    label,
                );
            }
        }

        self.y = top - height - 12.0;
    }

    fn table_header(&mut self) {
        let top = self.y;
        self.push(DrawOp::FillRect {
            x: MARGIN,
            y: top - HEADER_ROW_HEIGHT,
            width: CONTENT_WIDTH,
            height: HEADER_ROW_HEIGHT,
            color: Color::ACCENT,
        });
        let mut x = MARGIN;
        for column in &TABLE_COLUMNS {
            self.text(
                column.label_en,
                "column header",
                Slot::cell(x, top - 11.0, column.width, Align::Center),
                Style::new(8.0).bold().color(Color::WHITE),
            );
            self.text(
                column.label_ar,
                "column header",
                Slot::cell(x, top - 22.0, column.width, Align::Center),
                Style::new(7.5).color(Color::WHITE),
            );
            x += column.width;
        }
        self.y = top - HEADER_ROW_HEIGHT;
    }

    fn section_row(&mut self, name: &str) {
        let top = self.y;
        self.push(DrawOp::FillRect {
            x: MARGIN,
            y: top - ITEM_ROW_HEIGHT,
            width: CONTENT_WIDTH,
            height: ITEM_ROW_HEIGHT,
            color: Color::SHADE,
        });
        self.text(
            name,
            "section",
            Slot::cell(MARGIN, top - 11.5, CONTENT_WIDTH, Align::Left),
            Style::new(8.5).bold(),
        );
        self.y = top - ITEM_ROW_HEIGHT;
    }

    fn item_row(&mut self, item: &LineItem) {
        let decimals = self.config.render.amount_decimals;
        let top = self.y;
        let cells = [
            item.description.clone(),
            quantity_text(item.quantity),
            item.unit.clone().unwrap_or_default(),
            item.date.clone().unwrap_or_default(),
            format_amount(item.unit_price, decimals),
            format_amount(item.discount, decimals),
            format_amount(item.amount, decimals),
        ];
        let source = format!("row {} of {}", item.source.row, item.source.sheet);

        let mut x = MARGIN;
        for (column, value) in TABLE_COLUMNS.iter().zip(cells.iter()) {
            self.push(DrawOp::StrokeRect {
                x,
                y: top - ITEM_ROW_HEIGHT,
                width: column.width,
                height: ITEM_ROW_HEIGHT,
                color: Color::GRID,
                line_width: 0.5,
            });
            let field = format!("{} ({})", column.label_en.to_lowercase(), source);
            self.text(
                value,
                &field,
                Slot::cell(x, top - 11.5, column.width, column.align),
                Style::new(8.0),
            );
            x += column.width;
        }
        self.y = top - ITEM_ROW_HEIGHT;
    }

    fn total_row(&mut self, displayed_total: &str) {
        let top = self.y;
        self.push(DrawOp::FillRect {
            x: MARGIN,
            y: top - TOTAL_ROW_HEIGHT,
            width: CONTENT_WIDTH,
            height: TOTAL_ROW_HEIGHT,
            color: Color::SHADE,
        });
        self.push(DrawOp::StrokeRect {
            x: MARGIN,
            y: top - TOTAL_ROW_HEIGHT,
            width: CONTENT_WIDTH,
            height: TOTAL_ROW_HEIGHT,
            color: Color::GRID,
            line_width: 0.75,
        });

        let amount_width = TABLE_COLUMNS[6].width;
        let half = (CONTENT_WIDTH - amount_width) / 2.0;
        let y = top - 13.5;
        let style = Style::new(9.5).bold();
        let label = format!("Grand Total ({})", self.record.currency);
        self.text(&label, "grand total", Slot::cell(MARGIN, y, half, Align::Left), style);
        self.text("الإجمالي", "grand total", Slot::cell(MARGIN + half, y, half, Align::Right), style);
        self.text(
            displayed_total,
            "grand total",
            Slot::cell(MARGIN + 2.0 * half, y, amount_width, Align::Right),
            style,
        );
        self.y = top - TOTAL_ROW_HEIGHT;
    }

    fn continuation_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.current = self.pages.len() - 1;
        let top = PAGE_HEIGHT - MARGIN;
        let split = CONTENT_WIDTH * 0.6;

        let title = format!(
            "{} - Invoice No: {} (continued)",
            self.config.branding.title_en,
            self.record.id()
        );
        self.text(
            &title,
            "continuation header",
            Slot::left(MARGIN, top - 12.0, split),
            Style::new(10.0).bold(),
        );
        let record = self.record;
        if let Some(patient) = record.header.patient_name.as_deref() {
            self.text(
                patient,
                "patient name",
                Slot::right(MARGIN + split, top - 12.0, CONTENT_WIDTH - split),
                Style::new(9.0),
            );
        }
        self.y = top - 20.0;
        self.rule(self.y, Color::ACCENT, 1.0);
        self.y -= 8.0;
        self.table_header();
    }

    fn footers(&mut self) {
        let total = self.pages.len();
        let prepared = format!("Prepared by: {}", self.config.branding.prepared_by);
        let note = self.config.branding.footer_note.clone();
        let left = CONTENT_WIDTH * 0.35;
        let muted = Style::new(8.0).color(Color::MUTED);

        for index in 0..total {
            self.current = index;
            self.rule(MARGIN + 30.0, Color::ACCENT, 1.0);
            self.text(&prepared, "prepared by", Slot::left(MARGIN, MARGIN + 18.0, left), muted);
            self.text(
                &note,
                "footer note",
                Slot::right(MARGIN + left, MARGIN + 18.0, CONTENT_WIDTH - left),
                muted,
            );
            self.text(
                &format!("Page {} of {}", index + 1, total),
                "page number",
                Slot::center(MARGIN, MARGIN + 4.0, CONTENT_WIDTH),
                muted,
            );
        }
    }
}

fn quantity_text(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

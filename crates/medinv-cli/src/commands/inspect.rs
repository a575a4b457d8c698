//! Inspect command - what the extractor sees in a workbook.

use std::path::PathBuf;

use clap::Args;
use console::style;

use medinv_core::extract::{SheetExtractor, SheetInspection};
use medinv_core::sheet::read_workbook_path;

use super::Globals;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Workbook to inspect
    workbook: PathBuf,

    /// Only this sheet
    #[arg(short, long)]
    sheet: Option<String>,

    /// Rows to preview per sheet
    #[arg(short, long, default_value = "10")]
    rows: usize,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

pub async fn run(args: InspectArgs, globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;

    if !args.workbook.exists() {
        anyhow::bail!("Workbook not found: {}", args.workbook.display());
    }
    let workbook = read_workbook_path(&args.workbook)?;
    let extractor = SheetExtractor::from_config(&config);

    let inspections: Vec<SheetInspection> = match &args.sheet {
        Some(name) => {
            let Some(table) = workbook.sheet(name) else {
                let names: Vec<&str> = workbook.sheets.iter().map(|t| t.name.as_str()).collect();
                anyhow::bail!("Sheet '{}' not found (sheets: {})", name, names.join(", "));
            };
            vec![extractor.inspect_sheet(table, args.rows)]
        }
        None => extractor.inspect(&workbook, args.rows),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&inspections)?);
        return Ok(());
    }

    for inspection in &inspections {
        print_inspection(inspection);
    }
    Ok(())
}

fn print_inspection(inspection: &SheetInspection) {
    println!(
        "{} {} ({} rows x {} columns)",
        style("Sheet").bold(),
        style(&inspection.sheet).cyan().bold(),
        inspection.row_count,
        inspection.column_count
    );

    println!("  {}", style("First rows:").bold());
    for row in &inspection.preview {
        println!("    {:>4} | {}", row.row, row.cells.join(" | "));
    }

    match inspection.header_row {
        Some(row) => {
            println!("  {} row {}", style("Header:").bold(), row);
            for column in &inspection.columns {
                println!("    {:<16} column {}", column.column, column.letter);
            }
            if !inspection.missing.is_empty() {
                println!(
                    "    {} {}",
                    style("missing:").yellow(),
                    inspection.missing.join(", ")
                );
            }
        }
        None => println!("  {} no item table header found", style("Header:").bold()),
    }

    if !inspection.metadata.is_empty() {
        println!("  {}", style("Metadata:").bold());
        for (key, value) in &inspection.metadata {
            println!("    {:<16} {}", key, value);
        }
    }

    if let Some(sample) = &inspection.sample_row {
        println!(
            "  {} row {}: {}",
            style("Sample:").bold(),
            sample.row,
            sample.cells.join(" | ")
        );
    }
    match &inspection.grand_total_row {
        Some(total) => println!(
            "  {} row {}: {}",
            style("Grand total:").bold(),
            total.row,
            total.cells.join(" | ")
        ),
        None => println!("  {} not found", style("Grand total:").bold()),
    }
    println!();
}

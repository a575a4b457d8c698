//! Process command - generate invoices from workbooks.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{error, warn};

use medinv_core::batch::{BatchProcessor, BatchReport};
use medinv_core::extract::rules::format_amount;

use super::Globals;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input workbook or glob pattern
    #[arg(required = true)]
    input: String,

    /// Also write a summary CSV next to the invoices
    #[arg(long)]
    summary: bool,

    /// Keep going when a workbook cannot be read
    #[arg(long)]
    continue_on_error: bool,
}

/// Workbooks matching a path or glob pattern.
fn expand_input(input: &str) -> anyhow::Result<Vec<PathBuf>> {
    let files: Vec<PathBuf> = glob(input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            WORKBOOK_EXTENSIONS.contains(&ext.as_str())
        })
        .collect();
    Ok(files)
}

pub async fn run(args: ProcessArgs, globals: &Globals) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = globals.load_config()?;
    let mut store = globals.open_store(&config)?;

    let files = expand_input(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching workbooks found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} workbook(s) to process",
        style("ℹ").blue(),
        files.len()
    );

    let multi_progress = MultiProgress::new();
    let files_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
    files_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} workbooks")?
            .progress_chars("=>-"),
    );
    let invoices_pb = multi_progress.add(ProgressBar::new(0));
    invoices_pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.green/white} {pos}/{len} invoices {msg}")?
            .progress_chars("##-"),
    );

    let processor = BatchProcessor::from_config(&config).with_progress(|p| {
        invoices_pb.set_length(p.total as u64);
        invoices_pb.set_position(p.done as u64);
    });

    let mut report = BatchReport::default();
    let mut unreadable: Vec<(PathBuf, String)> = Vec::new();

    for path in &files {
        invoices_pb.set_position(0);
        invoices_pb.set_message(display_name(path));
        match processor.process_path(path, &mut store) {
            Ok(file_report) => report.merge(file_report),
            Err(e) => {
                if args.continue_on_error {
                    warn!("Failed to read {}: {}", path.display(), e);
                    unreadable.push((path.clone(), e.to_string()));
                } else {
                    error!("Failed to read {}: {}", path.display(), e);
                    anyhow::bail!("Processing failed for {}: {}", path.display(), e);
                }
            }
        }
        files_pb.inc(1);
    }

    invoices_pb.finish_and_clear();
    files_pb.finish_with_message("Complete");
    drop(processor);

    print_report(&report, &unreadable, config.render.amount_decimals);

    if args.summary {
        let summary_path = store.dir().join("summary.csv");
        write_summary(&summary_path, &report)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Generated {} invoice(s) in {:?} into {}",
        style("✓").green(),
        report.documents.len(),
        start.elapsed(),
        store.dir().display()
    );

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_report(report: &BatchReport, unreadable: &[(PathBuf, String)], decimals: u32) {
    if !report.documents.is_empty() {
        println!();
        println!("{}", style("Invoices:").bold());
        for doc in &report.documents {
            println!(
                "  {} {:<20} {:>14} {}  {} ({} page{})",
                style("✓").green(),
                doc.id,
                format_amount(doc.total, decimals),
                doc.currency,
                doc.file_name,
                doc.page_count,
                if doc.page_count == 1 { "" } else { "s" }
            );
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!(
            "{} ({} skipped)",
            style("Problems:").yellow().bold(),
            report.skipped()
        );
        for err in &report.errors {
            println!("  {} {}", style("!").yellow(), err);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("{}", style("Shaping warnings:").yellow().bold());
        for warning in &report.warnings {
            println!("  {} {}", style("!").yellow(), warning);
        }
    }

    if !report.failures.is_empty() || !unreadable.is_empty() {
        println!();
        println!("{}", style("Failures:").red().bold());
        for failure in &report.failures {
            println!(
                "  {} {}: {}",
                style("✗").red(),
                failure.invoice,
                failure.reason
            );
        }
        for (path, reason) in unreadable {
            println!("  {} {}: {}", style("✗").red(), path.display(), reason);
        }
    }
}

fn write_summary(path: &Path, report: &BatchReport) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "invoice",
        "patient",
        "date",
        "total",
        "currency",
        "file",
        "pages",
        "source",
    ])?;

    for doc in &report.documents {
        wtr.write_record([
            doc.invoice_number.as_str(),
            doc.patient_name.as_deref().unwrap_or(""),
            doc.date.as_deref().unwrap_or(""),
            &doc.total.to_string(),
            doc.currency.as_str(),
            doc.file_name.as_str(),
            &doc.page_count.to_string(),
            doc.source_file.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_input_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xlsx"), b"").unwrap();
        std::fs::write(dir.path().join("b.ODS"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let pattern = format!("{}/*", dir.path().display());
        let mut names: Vec<String> = expand_input(&pattern)
            .unwrap()
            .iter()
            .map(|p| display_name(p))
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.xlsx", "b.ODS"]);
    }
}

//! Show command - one stored invoice.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use medinv_core::extract::rules::format_amount;
use medinv_core::store::DocumentStore;

use super::Globals;

/// Arguments for the show command.
#[derive(Args)]
pub struct ShowArgs {
    /// Invoice id, invoice number or file name
    invoice: String,

    /// Copy the PDF to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the index entry as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: ShowArgs, globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;
    let store = globals.open_store(&config)?;

    let Some(invoice) = store.find(&args.invoice)? else {
        anyhow::bail!("Invoice not found: {}", args.invoice);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&invoice)?);
    } else {
        println!("{}", style(format!("Invoice {}", invoice.invoice_number)).bold());
        println!("  Patient:   {}", invoice.patient_name.as_deref().unwrap_or("-"));
        println!("  Date:      {}", invoice.date.as_deref().unwrap_or("-"));
        println!(
            "  Total:     {} {}",
            style(format_amount(invoice.total, config.render.amount_decimals)).bold(),
            invoice.currency
        );
        println!("  File:      {} ({} pages)", invoice.file_name, invoice.page_count);
        if let Some(source) = &invoice.source_file {
            println!("  Source:    {} [{}]", source, invoice.source_sheets.join(", "));
        }
        println!("  Stored at: {}", invoice.stored_at.format("%Y-%m-%d %H:%M:%S UTC"));
        if !invoice.metadata.is_empty() {
            println!("  Details:");
            for (key, value) in &invoice.metadata {
                println!("    {:<16} {}", key, value);
            }
        }
    }

    if let Some(output) = &args.output {
        let bytes = store.read(&invoice.file_name)?;
        fs::write(output, bytes)?;
        println!(
            "{} PDF written to {}",
            style("✓").green(),
            output.display()
        );
    }

    Ok(())
}

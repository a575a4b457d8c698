//! List command - the invoice dashboard.

use clap::Args;
use console::style;
use rust_decimal::Decimal;

use medinv_core::extract::rules::format_amount;
use medinv_core::models::invoice::StoredInvoice;
use medinv_core::store::DocumentStore;

use super::Globals;

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: ListFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ListFormat {
    /// Aligned table
    Table,
    /// JSON array of index entries
    Json,
    /// CSV
    Csv,
}

pub async fn run(args: ListArgs, globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;
    let store = globals.open_store(&config)?;
    let invoices = store.list()?;

    match args.format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&invoices)?),
        ListFormat::Csv => print!("{}", format_csv(&invoices)?),
        ListFormat::Table => print_table(&invoices, config.render.amount_decimals),
    }

    Ok(())
}

fn format_csv(invoices: &[StoredInvoice]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id", "patient", "date", "total", "currency", "file", "pages", "stored_at",
    ])?;
    for inv in invoices {
        wtr.write_record([
            inv.id.as_str(),
            inv.patient_name.as_deref().unwrap_or(""),
            inv.date.as_deref().unwrap_or(""),
            &inv.total.to_string(),
            inv.currency.as_str(),
            inv.file_name.as_str(),
            &inv.page_count.to_string(),
            &inv.stored_at.to_rfc3339(),
        ])?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn print_table(invoices: &[StoredInvoice], decimals: u32) {
    if invoices.is_empty() {
        println!("{} No invoices stored yet.", style("ℹ").blue());
        return;
    }

    println!(
        "{}",
        style(format!(
            "{:<20} {:<28} {:<12} {:>14} {:<5} {}",
            "Invoice", "Patient", "Date", "Total", "Cur", "File"
        ))
        .bold()
    );
    for inv in invoices {
        println!(
            "{:<20} {:<28} {:<12} {:>14} {:<5} {}",
            truncate(&inv.id, 20),
            truncate(inv.patient_name.as_deref().unwrap_or("-"), 28),
            inv.date.as_deref().unwrap_or("-"),
            format_amount(inv.total, decimals),
            inv.currency,
            inv.file_name
        );
    }

    let total = invoices
        .iter()
        .fold(Decimal::ZERO, |acc, i| acc.saturating_add(i.total));
    println!();
    println!(
        "{} invoice(s), combined total {}",
        invoices.len(),
        style(format_amount(total, decimals)).bold()
    );
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let kept: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("INV1", 20), "INV1");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}

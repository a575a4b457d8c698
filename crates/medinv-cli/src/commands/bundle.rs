//! Bundle command - all invoices as one ZIP.

use std::path::PathBuf;

use clap::Args;
use console::style;

use medinv_core::archive::write_bundle_file;

use super::Globals;

/// Arguments for the bundle command.
#[derive(Args)]
pub struct BundleArgs {
    /// Archive path (default: the configured archive name in the current
    /// directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn run(args: BundleArgs, globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;
    let store = globals.open_store(&config)?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.storage.archive_name));
    let count = write_bundle_file(&store, &output)?;

    println!(
        "{} Bundled {} invoice(s) into {}",
        style("✓").green(),
        count,
        output.display()
    );
    Ok(())
}

//! Clear command - empty the invoice database.

use clap::Args;
use console::{Term, style};

use medinv_core::store::DocumentStore;

use super::Globals;

/// Arguments for the clear command.
#[derive(Args)]
pub struct ClearArgs {
    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

pub async fn run(args: ClearArgs, globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;
    let mut store = globals.open_store(&config)?;

    let count = store.list()?.len();
    if count == 0 {
        println!("{} Nothing to clear.", style("ℹ").blue());
        return Ok(());
    }

    if !args.yes {
        let term = Term::stdout();
        term.write_str(&format!(
            "Delete {} invoice(s) from {}? [y/N] ",
            count,
            store.dir().display()
        ))?;
        let answer = term.read_line().unwrap_or_default();
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("{} Aborted.", style("ℹ").blue());
            return Ok(());
        }
    }

    let removed = store.clear()?;
    println!("{} Cleared {} invoice(s)", style("✓").green(), removed);
    Ok(())
}

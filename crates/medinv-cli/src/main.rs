//! CLI application for bilingual medical invoices.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{Globals, bundle, clear, config, inspect, list, process, serve, show};

/// medinv - Turn billing spreadsheets into bilingual PDF invoices
#[derive(Parser)]
#[command(name = "medinv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Invoice store directory (overrides the config)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate invoices from one or more workbooks
    Process(process::ProcessArgs),

    /// List stored invoices
    List(list::ListArgs),

    /// Show one stored invoice
    Show(show::ShowArgs),

    /// Bundle all invoices into a ZIP archive
    Bundle(bundle::BundleArgs),

    /// Delete all stored invoices
    Clear(clear::ClearArgs),

    /// Check what the extractor sees in a workbook
    Inspect(inspect::InspectArgs),

    /// Manage configuration
    Config(config::ConfigArgs),

    /// Start the web UI
    Serve(serve::ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let globals = Globals {
        config: cli.config,
        store_dir: cli.store_dir,
    };

    match cli.command {
        Commands::Process(args) => process::run(args, &globals).await,
        Commands::List(args) => list::run(args, &globals).await,
        Commands::Show(args) => show::run(args, &globals).await,
        Commands::Bundle(args) => bundle::run(args, &globals).await,
        Commands::Clear(args) => clear::run(args, &globals).await,
        Commands::Inspect(args) => inspect::run(args, &globals).await,
        Commands::Config(args) => config::run(args, &globals).await,
        Commands::Serve(args) => serve::run(args, &globals).await,
    }
}

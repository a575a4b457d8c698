//! Config command - read and edit the JSON settings file.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use medinv_core::models::config::MedinvConfig;

use super::Globals;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a configuration file with the defaults
    Init(InitArgs),

    /// Print one value
    Get {
        /// Dotted key (e.g. "render.amount_decimals")
        key: String,
    },

    /// Change one value
    Set {
        /// Dotted key (e.g. "branding.prepared_by")
        key: String,
        /// New value; parsed as JSON, otherwise taken as a string
        value: String,
    },

    /// Print where the configuration file lives
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Where to write the file (default: the active config path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, globals: &Globals) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            if !globals.config_path().exists() {
                println!(
                    "{} No config file found, showing defaults.",
                    style("ℹ").blue()
                );
            }
            let config = globals.load_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommand::Init(init) => init_config(init, globals),
        ConfigCommand::Get { key } => {
            let json = serde_json::to_value(globals.load_config()?)?;
            println!("{}", serde_json::to_string_pretty(lookup(&json, &key)?)?);
            Ok(())
        }
        ConfigCommand::Set { key, value } => set_config(&key, &value, globals),
        ConfigCommand::Path => {
            let path = globals.config_path();
            println!("Configuration file: {}", path.display());
            if path.exists() {
                println!("Status: {}", style("exists").green());
            } else {
                println!("Status: {}", style("not created").yellow());
                println!("Run 'medinv config init' to create it.");
            }
            Ok(())
        }
    }
}

fn init_config(args: InitArgs, globals: &Globals) -> anyhow::Result<()> {
    let path = args.output.unwrap_or_else(|| globals.config_path());
    if path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    MedinvConfig::default().save(&path)?;
    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

fn set_config(key: &str, raw: &str, globals: &Globals) -> anyhow::Result<()> {
    let path = globals.config_path();
    let config = if path.exists() {
        MedinvConfig::from_file(&path)?
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        MedinvConfig::default()
    };

    let value = parse_value(raw);
    let updated = apply(&config, key, value.clone())?;
    updated.save(&path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&value)?
    );
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn lookup<'a>(json: &'a Value, key: &str) -> anyhow::Result<&'a Value> {
    key.split('.').try_fold(json, |node, part| {
        node.get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
    })
}

/// Replace an existing key and re-validate the whole configuration.
fn apply(config: &MedinvConfig, key: &str, value: Value) -> anyhow::Result<MedinvConfig> {
    let mut json = serde_json::to_value(config)?;
    let (parent, leaf) = match key.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, key),
    };

    let mut node = &mut json;
    if let Some(parent) = parent {
        for part in parent.split('.') {
            node = node
                .get_mut(part)
                .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
        }
    }
    let Some(object) = node.as_object_mut() else {
        anyhow::bail!("Cannot set {}: parent is not a section", key);
    };
    if !object.contains_key(leaf) {
        anyhow::bail!("Configuration key not found: {}", key);
    }
    object.insert(leaf.to_string(), value);

    serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_nested_key() {
        let json = serde_json::to_value(MedinvConfig::default()).unwrap();
        assert_eq!(
            lookup(&json, "storage.index_file").unwrap(),
            &Value::String("invoices_db.json".into())
        );
        assert!(lookup(&json, "storage.nope").is_err());
    }

    #[test]
    fn test_apply_number_and_string() {
        let config = MedinvConfig::default();
        let config = apply(&config, "render.amount_decimals", parse_value("2")).unwrap();
        let config = apply(&config, "branding.prepared_by", parse_value("Reception")).unwrap();
        assert_eq!(config.render.amount_decimals, 2);
        assert_eq!(config.branding.prepared_by, "Reception");
    }

    #[test]
    fn test_apply_rejects_unknown_and_mistyped() {
        let config = MedinvConfig::default();
        assert!(apply(&config, "render.colour", parse_value("red")).is_err());
        assert!(apply(&config, "render.amount_decimals", parse_value("many")).is_err());
    }

    #[test]
    fn test_apply_optional_path() {
        let config = MedinvConfig::default();
        let config = apply(&config, "render.logo_path", parse_value("/srv/logo.png")).unwrap();
        assert_eq!(config.render.logo_path, Some(PathBuf::from("/srv/logo.png")));
    }
}

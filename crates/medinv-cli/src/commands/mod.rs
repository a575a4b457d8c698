//! Subcommands and the settings they share.

pub mod bundle;
pub mod clear;
pub mod config;
pub mod inspect;
pub mod list;
pub mod process;
pub mod serve;
pub mod show;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use medinv_core::models::config::MedinvConfig;
use medinv_core::store::FsDocumentStore;

/// Global flags every command sees.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    /// `--config`
    pub config: Option<PathBuf>,
    /// `--store-dir`
    pub store_dir: Option<PathBuf>,
}

/// `<platform config dir>/medinv/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("medinv")
        .join("config.json")
}

impl Globals {
    /// The config file commands read and write.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Configuration from `--config`, else the platform config file if it
    /// exists, else defaults. `--store-dir` overrides the output directory.
    pub fn load_config(&self) -> anyhow::Result<MedinvConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    read_config(&path)?
                } else {
                    MedinvConfig::default()
                }
            }
        };
        if let Some(dir) = &self.store_dir {
            config.storage.output_dir = dir.clone();
        }
        Ok(config)
    }

    pub fn open_store(&self, config: &MedinvConfig) -> anyhow::Result<FsDocumentStore> {
        let store = FsDocumentStore::from_config(&config.storage).with_context(|| {
            format!(
                "failed to open invoice store in {}",
                config.storage.output_dir.display()
            )
        })?;
        debug!("Using store {}", store.dir().display());
        Ok(store)
    }
}

fn read_config(path: &Path) -> anyhow::Result<MedinvConfig> {
    MedinvConfig::from_file(path)
        .with_context(|| format!("failed to read config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_dir_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        MedinvConfig::default().save(&config_path).unwrap();
        let globals = Globals {
            config: Some(config_path),
            store_dir: Some(PathBuf::from("/tmp/medinv-test-store")),
        };
        let config = globals.load_config().unwrap();
        assert_eq!(
            config.storage.output_dir,
            PathBuf::from("/tmp/medinv-test-store")
        );
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let globals = Globals {
            config: Some(PathBuf::from("/nonexistent/medinv.json")),
            store_dir: None,
        };
        assert!(globals.load_config().is_err());
    }
}

//! Directory-backed store: one PDF per invoice plus a JSON index.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{DocumentStore, Result, check_file_owner, matches_key};
use crate::error::StorageError;
use crate::models::config::StorageConfig;
use crate::models::invoice::StoredInvoice;

/// Stores documents in a directory with an `invoices_db.json`-style index.
#[derive(Debug)]
pub struct FsDocumentStore {
    dir: PathBuf,
    index_path: PathBuf,
    entries: Vec<StoredInvoice>,
}

impl FsDocumentStore {
    /// Open (creating if needed) a store in `dir` with the given index file
    /// name.
    pub fn open(dir: impl Into<PathBuf>, index_file: &str) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        let index_path = dir.join(index_file);

        let entries = if index_path.exists() {
            let data =
                std::fs::read_to_string(&index_path).map_err(|e| StorageError::io(&index_path, e))?;
            if data.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&data).map_err(|source| StorageError::Index {
                    path: index_path.clone(),
                    source,
                })?
            }
        } else {
            Vec::new()
        };

        debug!(
            "Opened store {} with {} invoice(s)",
            dir.display(),
            entries.len()
        );
        Ok(Self {
            dir,
            index_path,
            entries,
        })
    }

    /// Open the store described by the storage configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::open(&config.output_dir, &config.index_file)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Path of a stored document. Names that could escape the store
    /// directory are rejected.
    pub fn document_path(&self, file_name: &str) -> Result<PathBuf> {
        let valid = !file_name.is_empty()
            && !file_name.contains(['/', '\\'])
            && file_name != "."
            && file_name != "..";
        if !valid {
            return Err(StorageError::NotFound(file_name.to_string()));
        }
        Ok(self.dir.join(file_name))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        tmp.write_all(bytes).map_err(|e| StorageError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| StorageError::io(path, e.error))?;
        Ok(())
    }

    fn write_index(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries).map_err(|source| StorageError::Index {
            path: self.index_path.clone(),
            source,
        })?;
        self.write_atomic(&self.index_path, &json)
    }

    fn remove_file(&self, file_name: &str) {
        let Ok(path) = self.document_path(file_name) else {
            return;
        };
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

impl DocumentStore for FsDocumentStore {
    fn save(&mut self, entry: StoredInvoice, bytes: &[u8]) -> Result<StoredInvoice> {
        check_file_owner(self.entries.iter(), &entry)?;
        let path = self.document_path(&entry.file_name)?;
        self.write_atomic(&path, bytes)?;

        match self.entries.iter().position(|e| e.id == entry.id) {
            Some(index) => {
                let previous = std::mem::replace(&mut self.entries[index], entry.clone());
                if previous.file_name != entry.file_name {
                    self.remove_file(&previous.file_name);
                }
                debug!("Replaced invoice {} in store", entry.id);
            }
            None => self.entries.push(entry.clone()),
        }

        self.write_index()?;
        Ok(entry)
    }

    fn list(&self) -> Result<Vec<StoredInvoice>> {
        Ok(self.entries.clone())
    }

    fn find(&self, key: &str) -> Result<Option<StoredInvoice>> {
        Ok(self.entries.iter().find(|e| matches_key(e, key)).cloned())
    }

    fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        let path = self.document_path(file_name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        let entry = self.entries.remove(index);
        self.remove_file(&entry.file_name);
        self.write_index()?;
        Ok(true)
    }

    fn clear(&mut self) -> Result<usize> {
        let entries = std::mem::take(&mut self.entries);
        for entry in &entries {
            self.remove_file(&entry.file_name);
        }
        self.write_index()?;
        info!("Cleared {} invoice(s) from {}", entries.len(), self.dir.display());
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::document_file_name;
    use crate::store::tests::entry;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
            store.save(entry("INV1", 100), b"%PDF-1").unwrap();
            store.save(entry("INV2", 50), b"%PDF-2").unwrap();
        }

        let store = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], entry("INV1", 100));
        assert_eq!(store.read("Invoice_INV2.pdf").unwrap(), b"%PDF-2");
        assert!(dir.path().join("invoices_db.json").exists());
    }

    #[test]
    fn test_save_replaces_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
        store.save(entry("INV1", 100), b"old").unwrap();
        store.save(entry("INV1", 300), b"new").unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].total, Decimal::from(300));
        assert_eq!(store.read("Invoice_INV1.pdf").unwrap(), b"new");
    }

    #[test]
    fn test_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
        assert!(matches!(store.read("../secret"), Err(StorageError::NotFound(_))));
        assert!(matches!(store.read("missing.pdf"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_remove_and_clear_delete_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
        store.save(entry("INV1", 100), b"one").unwrap();
        store.save(entry("INV2", 50), b"two").unwrap();

        assert!(store.remove("INV1").unwrap());
        assert!(!dir.path().join("Invoice_INV1.pdf").exists());
        assert_eq!(store.clear().unwrap(), 1);
        assert!(!dir.path().join("Invoice_INV2.pdf").exists());

        let reopened = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
        assert!(reopened.list().unwrap().is_empty());
    }

    #[test]
    fn test_shared_file_name_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
        store.save(entry("INV-1", 100), b"first").unwrap();

        let mut other = entry("INV/1", 999);
        other.file_name = "Invoice_INV-1.pdf".to_string();
        let err = store.save(other, b"second").unwrap_err();
        assert!(matches!(err, StorageError::NameConflict { ref owner, .. } if owner == "INV-1"));

        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.read("Invoice_INV-1.pdf").unwrap(), b"first");
    }

    #[test]
    fn test_colliding_ids_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
        for (id, bytes) in [("INV/1", b"slash"), ("INV-1", b"dash_")] {
            let mut e = entry(id, 1);
            e.file_name = document_file_name("Invoice_", id);
            store.save(e, bytes).unwrap();
        }

        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_ne!(list[0].file_name, list[1].file_name);
        assert_eq!(store.read(&list[0].file_name).unwrap(), b"slash");
        assert_eq!(store.read(&list[1].file_name).unwrap(), b"dash_");

        assert!(store.remove("INV/1").unwrap());
        assert_eq!(store.read(&list[1].file_name).unwrap(), b"dash_");
    }

    #[test]
    fn test_corrupt_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("invoices_db.json"), "{not json").unwrap();
        let err = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap_err();
        assert!(matches!(err, StorageError::Index { .. }));
    }
}

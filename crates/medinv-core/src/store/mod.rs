//! Persisted invoice documents and their index.

mod fs;

pub use fs::FsDocumentStore;

use crate::error::StorageError;
use crate::models::invoice::StoredInvoice;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A place rendered invoices are kept and listed from.
///
/// Entries are keyed by invoice id; saving an id that already exists
/// replaces the old entry and its document.
pub trait DocumentStore {
    /// Persist a document and its index entry.
    fn save(&mut self, entry: StoredInvoice, bytes: &[u8]) -> Result<StoredInvoice>;

    /// All entries, in the order they were first saved.
    fn list(&self) -> Result<Vec<StoredInvoice>>;

    /// Look up an entry by id, invoice number or file name.
    fn find(&self, key: &str) -> Result<Option<StoredInvoice>>;

    /// Bytes of a stored document, by file name.
    fn read(&self, file_name: &str) -> Result<Vec<u8>>;

    /// Remove one entry and its document. Returns whether it existed.
    fn remove(&mut self, id: &str) -> Result<bool>;

    /// Remove everything. Returns the number of entries removed.
    fn clear(&mut self) -> Result<usize>;
}

fn matches_key(entry: &StoredInvoice, key: &str) -> bool {
    entry.id == key || entry.invoice_number == key || entry.file_name == key
}

/// Fail when `entry`'s file name is already used by a different invoice.
pub(crate) fn check_file_owner<'a>(
    mut existing: impl Iterator<Item = &'a StoredInvoice>,
    entry: &StoredInvoice,
) -> Result<()> {
    match existing.find(|e| e.file_name == entry.file_name && e.id != entry.id) {
        Some(owner) => Err(StorageError::NameConflict {
            file_name: entry.file_name.clone(),
            owner: owner.id.clone(),
            id: entry.id.clone(),
        }),
        None => Ok(()),
    }
}

/// In-memory store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<(StoredInvoice, Vec<u8>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn save(&mut self, entry: StoredInvoice, bytes: &[u8]) -> Result<StoredInvoice> {
        check_file_owner(self.entries.iter().map(|(e, _)| e), &entry)?;
        let slot = (entry.clone(), bytes.to_vec());
        match self.entries.iter().position(|(e, _)| e.id == entry.id) {
            Some(index) => self.entries[index] = slot,
            None => self.entries.push(slot),
        }
        Ok(entry)
    }

    fn list(&self) -> Result<Vec<StoredInvoice>> {
        Ok(self.entries.iter().map(|(e, _)| e.clone()).collect())
    }

    fn find(&self, key: &str) -> Result<Option<StoredInvoice>> {
        Ok(self
            .entries
            .iter()
            .find(|(e, _)| matches_key(e, key))
            .map(|(e, _)| e.clone()))
    }

    fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        self.entries
            .iter()
            .find(|(e, _)| e.file_name == file_name)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(file_name.to_string()))
    }

    fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.entries.len();
        self.entries.retain(|(e, _)| e.id != id);
        Ok(self.entries.len() != before)
    }

    fn clear(&mut self) -> Result<usize> {
        let count = self.entries.len();
        self.entries.clear();
        Ok(count)
    }
}

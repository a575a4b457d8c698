//! Bundles every stored invoice into one ZIP archive.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::store::DocumentStore;

/// Write all stored documents, deflated and sorted by file name, into
/// `writer`. Entry timestamps are fixed so the same store contents give the
/// same archive. Returns the number of entries.
pub fn write_bundle<W: Write + Seek>(
    store: &dyn DocumentStore,
    writer: W,
) -> Result<usize, ArchiveError> {
    let mut entries = store.list()?;
    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut zip = ZipWriter::new(writer);
    for entry in &entries {
        let bytes = store.read(&entry.file_name)?;
        zip.start_file(entry.file_name.as_str(), options)?;
        zip.write_all(&bytes)?;
    }
    zip.finish()?;

    Ok(entries.len())
}

/// The bundle as bytes, for downloads.
pub fn bundle_bytes(store: &dyn DocumentStore) -> Result<Vec<u8>, ArchiveError> {
    let mut cursor = Cursor::new(Vec::new());
    write_bundle(store, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Write the bundle to a file.
pub fn write_bundle_file(store: &dyn DocumentStore, path: &Path) -> Result<usize, ArchiveError> {
    let file = std::fs::File::create(path)?;
    let count = write_bundle(store, file)?;
    info!("Bundled {} invoice(s) into {}", count, path.display());
    Ok(count)
}

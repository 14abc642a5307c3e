// src/backup/archive.rs
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::{BackupError, Result};

/// Name of the single entry holding the SQL dump inside every archive.
pub const DUMP_ENTRY_NAME: &str = "backup.sql";

/// MIME type the archive is uploaded with.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Creates an in-memory zip archive containing `dump` as its only entry.
///
/// The central directory is written before the buffer is returned, so the
/// bytes form a complete archive.
pub fn create_zip_archive(dump: &[u8]) -> Result<Vec<u8>> {
    let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(needs_zip64(dump.len()));

    zip_writer.start_file(DUMP_ENTRY_NAME, options).map_err(|e| {
        BackupError::ArchiveWrite(format!("Failed to create zip entry {}: {}", DUMP_ENTRY_NAME, e))
    })?;

    zip_writer.write_all(dump).map_err(|e| {
        BackupError::ArchiveWrite(format!("Failed to write to zip entry {}: {}", DUMP_ENTRY_NAME, e))
    })?;

    let finished = zip_writer
        .finish()
        .map_err(|e| BackupError::ArchiveWrite(format!("Failed to finalize zip archive: {}", e)))?;

    Ok(finished.into_inner())
}

/// Entries of 4 GiB or more need zip64 headers, which must be requested
/// before the entry is started.
fn needs_zip64(len: usize) -> bool {
    len as u64 >= u64::from(u32::MAX)
}

/// Reads the bytes of entry `name` back out of a zip archive.
#[cfg(test)]
pub(crate) fn read_zip_entry(archive: &[u8], name: &str) -> zip::result::ZipResult<Vec<u8>> {
    use std::io::Read;

    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut entry = zip.by_name(name)?;

    let mut contents = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut contents)?;
    Ok(contents)
}

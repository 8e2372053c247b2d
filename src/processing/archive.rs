use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};
use crate::errors::{AppError, Result};
use crate::utils::sanitize_filename;

/// One named buffer destined for the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

/// Packs `entries` into an uncompressed ZIP, in the order given.
///
/// Audio is already compressed, so entries are stored as-is. Timestamps and
/// permissions are fixed, which makes the output a pure function of the input.
pub fn build_archive(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
        .large_file(entries.iter().any(|e| e.bytes.len() as u64 >= u32::MAX as u64));

    let total: usize = entries.iter().map(|e| e.bytes.len()).sum();
    let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(total + entries.len() * 128)));
    let mut seen = HashSet::new();

    for entry in entries {
        let name = sanitize_filename(&entry.name);
        if name.is_empty() {
            return Err(AppError::Packaging(format!("Entry name '{}' is empty after sanitizing", entry.name)));
        }
        if !seen.insert(name.clone()) {
            return Err(AppError::Packaging(format!("Duplicate entry name: {}", name)));
        }

        zip.start_file(name.as_str(), options)?;
        zip.write_all(&entry.bytes)?;
    }

    let cursor = zip.finish()?;
    log::debug!("Packed {} entries into {} bytes", entries.len(), cursor.get_ref().len());
    Ok(cursor.into_inner())
}

//! Zip archives of a book's audio files

use crate::error::{LibraryError, Result};
use crate::storage::Storage;
use audioshelf_core::AudioFile;
use std::io::{self, Seek, Write};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One file to put in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name inside the archive
    pub name: String,
    /// Storage path to copy from
    pub path: String,
}

/// Entries to write, with duplicates already resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchivePlan {
    pub entries: Vec<ArchiveEntry>,
    /// Storage paths whose entry was replaced by a later file of the same name
    pub dropped: Vec<String>,
}

impl ArchivePlan {
    /// Builds the plan from files in upload order.
    ///
    /// Entries are named by basename. When two files share one, the later
    /// upload wins.
    pub fn from_files(files: &[AudioFile]) -> Self {
        let mut plan = Self::default();
        for file in files {
            let name = file.path.rsplit('/').next().unwrap_or(&file.path).to_string();
            if let Some(pos) = plan.entries.iter().position(|e| e.name == name) {
                let replaced = plan.entries.remove(pos);
                log::warn!(
                    "Archive entry {} from {} replaced by {}",
                    name,
                    replaced.path,
                    file.path
                );
                plan.dropped.push(replaced.path);
            }
            plan.entries.push(ArchiveEntry {
                name,
                path: file.path.clone(),
            });
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What ended up in a written archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub bytes: u64,
    /// Storage paths with no blob behind them
    pub missing: Vec<String>,
    pub dropped: Vec<String>,
}

/// Writes `plan` as a deflate zip, copying one blob at a time
pub fn write_archive<W>(storage: &dyn Storage, plan: &ArchivePlan, writer: W) -> Result<ArchiveSummary>
where
    W: Write + Seek,
{
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut summary = ArchiveSummary {
        dropped: plan.dropped.clone(),
        ..Default::default()
    };

    for entry in &plan.entries {
        let mut reader = match storage.open(&entry.path) {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Skipping missing audio file {} in archive", entry.path);
                summary.missing.push(entry.path.clone());
                continue;
            }
            Err(e) => return Err(LibraryError::storage(entry.path.clone(), e)),
        };

        zip.start_file(entry.name.as_str(), options)?;
        summary.bytes += io::copy(&mut reader, &mut zip)
            .map_err(|e| LibraryError::storage(entry.path.clone(), e))?;
        summary.entries += 1;
    }

    zip.finish()?;
    Ok(summary)
}

/// A finished archive waiting to be handed to the caller
#[derive(Debug)]
pub struct BookArchive {
    /// Spooled archive; deleted when dropped unless persisted
    pub file: NamedTempFile,
    /// Suggested download name, `{book_slug}.zip`
    pub download_name: String,
    pub summary: ArchiveSummary,
}

impl BookArchive {
    /// Writes `plan` into a fresh temporary file
    pub fn build(storage: &dyn Storage, book_slug: &str, plan: &ArchivePlan) -> Result<Self> {
        let mut file = NamedTempFile::new()?;
        let summary = write_archive(storage, plan, file.as_file_mut())?;
        file.as_file_mut().flush()?;

        log::info!(
            "Built archive for {} with {} entries ({} bytes)",
            book_slug,
            summary.entries,
            summary.bytes
        );
        Ok(Self {
            file,
            download_name: format!("{}.zip", book_slug),
            summary,
        })
    }

    /// Copies the archive to `dest`
    pub fn save_to(&self, dest: &std::path::Path) -> Result<u64> {
        Ok(std::fs::copy(self.file.path(), dest)?)
    }
}

//! CSV listings of authors and books

use crate::error::Result;
use audioshelf_core::Author;
use chrono::{DateTime, Local};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const AUTHOR_COLUMNS: [&str; 2] = ["first_name", "last_name"];

pub const BOOK_COLUMNS: [&str; 8] = [
    "title",
    "book_slug",
    "authors",
    "authors_slugs",
    "series",
    "genres",
    "audio_files_count",
    "is_read",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Authors,
    Books,
}

impl ExportKind {
    /// `{authors|books}_list_{YYYYmmdd_HHMMSS}.csv`
    pub fn file_name(&self, at: DateTime<Local>) -> String {
        let prefix = match self {
            Self::Authors => "authors",
            Self::Books => "books",
        };
        format!("{}_list_{}.csv", prefix, at.format("%Y%m%d_%H%M%S"))
    }
}

/// One line of the book listing, already flattened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRow {
    pub title: String,
    pub book_slug: String,
    /// "First Last" per author
    pub authors: Vec<String>,
    pub author_slugs: Vec<String>,
    pub series: Option<String>,
    pub genres: Vec<String>,
    pub audio_files_count: i64,
    pub is_read: bool,
}

impl BookRow {
    fn record(&self) -> [String; 8] {
        [
            self.title.clone(),
            self.book_slug.clone(),
            self.authors.join(", "),
            self.author_slugs.join(", "),
            self.series.clone().unwrap_or_default(),
            self.genres.join(", "),
            self.audio_files_count.to_string(),
            self.is_read.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
}

pub fn write_authors<W: Write>(authors: &[Author], writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(AUTHOR_COLUMNS)?;
    for author in authors {
        csv.write_record([author.first_name.as_str(), author.last_name.as_str()])?;
    }
    csv.flush()?;
    Ok(authors.len())
}

pub fn write_books<W: Write>(rows: &[BookRow], writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(BOOK_COLUMNS)?;
    for row in rows {
        csv.write_record(row.record())?;
    }
    csv.flush()?;
    Ok(rows.len())
}

/// Creates `dir` if needed and returns the timestamped target path
pub fn prepare_target(dir: &Path, kind: ExportKind) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dir.join(kind.file_name(Local::now())))
}

pub fn export_authors(dir: &Path, authors: &[Author]) -> Result<ExportSummary> {
    let path = prepare_target(dir, ExportKind::Authors)?;
    let rows = write_authors(authors, fs::File::create(&path)?)?;
    log::info!("Exported {} author(s) to {}", rows, path.display());
    Ok(ExportSummary { path, rows })
}

pub fn export_books(dir: &Path, books: &[BookRow]) -> Result<ExportSummary> {
    let path = prepare_target(dir, ExportKind::Books)?;
    let rows = write_books(books, fs::File::create(&path)?)?;
    log::info!("Exported {} book(s) to {}", rows, path.display());
    Ok(ExportSummary { path, rows })
}

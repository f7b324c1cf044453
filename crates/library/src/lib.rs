//! Audioshelf Library Management
//!
//! Orchestration layer over the core types, the database and media storage.
//! Owns the catalog lifecycle: slug assignment, image handling, audio uploads,
//! the rename cascade that keeps audio files under their book's slug, bulk
//! archives and CSV exports.

pub mod archive;
mod books;
pub mod cascade;
mod entities;
pub mod error;
pub mod export;
pub mod locks;
pub mod manager;
pub mod storage;

pub use archive::{ArchivePlan, ArchiveSummary, BookArchive};
pub use books::{BookChanges, BookDetails, NewBook};
pub use cascade::{CascadeReport, CascadeWarning, MovedFile, RenameCascade};
pub use entities::AuthorChanges;
pub use error::{LibraryError, LibraryResult};
pub use export::{BookRow, ExportKind, ExportSummary};
pub use locks::BookLocks;
pub use manager::{LibraryManager, Updated};
pub use storage::{LocalStorage, MemoryStorage, Storage};

use audioshelf_config::{Config, StorageConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Library configuration
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Database file path
    pub database_path: PathBuf,
    /// Media root, export directory, move timeout and accepted extensions
    pub storage: StorageConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("audioshelf.db"),
            storage: StorageConfig::default(),
        }
    }
}

impl LibraryConfig {
    pub fn new(database_path: impl Into<PathBuf>, media_root: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            database_path: database_path.into(),
            ..Default::default()
        };
        config.storage.media_root = media_root.into();
        config
    }

    /// Takes the database path and storage section from a loaded config file
    pub fn from_config(config: &Config) -> Self {
        Self {
            database_path: config.app.database_path.clone(),
            storage: config.storage.clone(),
        }
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.export_dir = dir.into();
        self
    }

    pub fn with_move_timeout_secs(mut self, secs: u64) -> Self {
        self.storage.move_timeout_secs = secs;
        self
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.move_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LibraryConfig::default();
        assert_eq!(config.database_path, PathBuf::from("audioshelf.db"));
        assert_eq!(config.storage.media_root, PathBuf::from("media"));
        assert_eq!(config.move_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = LibraryConfig::new("custom.db", "/srv/media")
            .with_export_dir("/srv/exports")
            .with_move_timeout_secs(5);

        assert_eq!(config.database_path, PathBuf::from("custom.db"));
        assert_eq!(config.storage.media_root, PathBuf::from("/srv/media"));
        assert_eq!(config.storage.export_dir, PathBuf::from("/srv/exports"));
        assert_eq!(config.move_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_config_file() {
        let mut file = Config::default();
        file.app.database_path = PathBuf::from("/data/shelf.db");
        file.storage.move_timeout_secs = 90;

        let config = LibraryConfig::from_config(&file);
        assert_eq!(config.database_path, PathBuf::from("/data/shelf.db"));
        assert_eq!(config.move_timeout(), Duration::from_secs(90));
    }
}

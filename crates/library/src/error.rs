//! Library error taxonomy

use audioshelf_core::error::AppError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    /// The derived slug would be empty, so the record cannot be saved
    #[error("{entity} has no usable name: its slug would be empty")]
    EmptyIdentity { entity: &'static str },

    #[error("{entity} slug '{slug}' is already in use")]
    SlugCollision { entity: &'static str, slug: String },

    /// A rename cascade could not relocate a file; the cascade was rolled back
    #[error("Failed to move {from} to {to}: {source}")]
    FileMove {
        from: String,
        to: String,
        #[source]
        source: io::Error,
    },

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    #[error("Storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error(transparent)]
    Database(AppError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl LibraryError {
    pub fn not_found(entity: impl Into<String>, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.to_string(),
        }
    }

    pub(crate) fn storage(path: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// True for errors the caller can fix by changing the input
    pub fn is_validation(&self) -> bool {
        match self {
            Self::EmptyIdentity { .. } | Self::SlugCollision { .. } | Self::NotFound { .. } => true,
            Self::Database(AppError::InvalidArgument { .. }) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<AppError> for LibraryError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::RecordNotFound { entity, identifier } => Self::NotFound { entity, identifier },
            other => Self::Database(other),
        }
    }
}

impl From<zip::result::ZipError> for LibraryError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

impl From<csv::Error> for LibraryError {
    fn from(err: csv::Error) -> Self {
        Self::Export(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_not_found_maps_to_not_found() {
        let err: LibraryError = AppError::not_found("Book", "dune").into();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Book not found: dune");
    }

    #[test]
    fn test_other_app_errors_stay_database() {
        let err: LibraryError = AppError::MigrationFailed {
            version: "2".to_string(),
            reason: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, LibraryError::Database(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_classification() {
        assert!(LibraryError::EmptyIdentity { entity: "Genre" }.is_validation());
        assert!(LibraryError::SlugCollision {
            entity: "Book",
            slug: "x".to_string()
        }
        .is_validation());
        assert!(LibraryError::from(AppError::invalid_argument("filename", "empty")).is_validation());
        assert!(!LibraryError::Archive("bad".to_string()).is_validation());
    }

    #[test]
    fn test_file_move_display() {
        let err = LibraryError::FileMove {
            from: "audio/a".to_string(),
            to: "audio/b".to_string(),
            source: io::Error::new(io::ErrorKind::TimedOut, "move exceeded 30s"),
        };
        assert_eq!(err.to_string(), "Failed to move audio/a to audio/b: move exceeded 30s");
    }
}

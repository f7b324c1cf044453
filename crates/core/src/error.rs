//! Error types and recovery strategies for Audioshelf
//!
//! Errors are classified into three severity tiers:
//! - **Recoverable**: Can be retried (busy database)
//! - **Degraded**: The operation failed but the catalog is consistent
//! - **Fatal**: Requires operator intervention (failed migration)
//!
//! Each error includes a recovery action to guide callers.

use std::fmt;
use std::io;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry with exponential backoff (e.g., database busy)
    RetryWithBackoff,
    /// Restore from the most recent backup
    RestoreBackup,
    /// No automatic recovery - user intervention required
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::RestoreBackup => write!(f, "Restoring from backup"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Operation failed but the catalog is still consistent
    Degraded,
    /// Critical error requiring user action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for Audioshelf
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Database Errors =====
    /// Database operation failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// Record not found in database
    #[error("Record not found: {entity} with {identifier}")]
    RecordNotFound { entity: String, identifier: String },

    // ===== File System Errors =====
    /// General I/O error
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: io::Error,
    },

    // ===== Generic Errors =====
    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DatabaseError { .. } => ErrorSeverity::Recoverable,
            Self::MigrationFailed { .. } => ErrorSeverity::Fatal,
            _ => ErrorSeverity::Degraded,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::DatabaseError { .. } => RecoveryAction::RetryWithBackoff,
            Self::MigrationFailed { .. } => RecoveryAction::RestoreBackup,
            _ => RecoveryAction::UserIntervention,
        }
    }

    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            Self::DatabaseError { .. } => {
                "The catalog database is temporarily unavailable. Please try again.".to_string()
            }
            Self::MigrationFailed { .. } => {
                "Failed to update the catalog database. Restore it from a backup.".to_string()
            }
            Self::RecordNotFound { entity, .. } => {
                format!("The requested {} was not found.", entity.to_lowercase())
            }
            Self::IoError { .. } => "A file operation failed. Please try again.".to_string(),
            Self::InvalidArgument { .. } => "Invalid input provided.".to_string(),
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        self.recovery_action() == RecoveryAction::RetryWithBackoff
    }

    /// Helper to create a database error from any error type
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create an I/O error that names what was being done
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            message: message.into(),
            source,
        }
    }

    /// Helper to create a not-found error for an entity
    pub fn not_found(entity: impl Into<String>, identifier: impl ToString) -> Self {
        Self::RecordNotFound {
            entity: entity.into(),
            identifier: identifier.to_string(),
        }
    }

    /// Helper to create an invalid-argument error
    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error reports a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_recovery_action_display() {
        assert_eq!(
            RecoveryAction::RetryWithBackoff.to_string(),
            "Retrying with backoff"
        );
        assert_eq!(
            RecoveryAction::RestoreBackup.to_string(),
            "Restoring from backup"
        );
        assert_eq!(
            RecoveryAction::UserIntervention.to_string(),
            "User intervention required"
        );
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Recoverable < ErrorSeverity::Degraded);
        assert!(ErrorSeverity::Degraded < ErrorSeverity::Fatal);
    }

    #[test]
    fn test_migration_failed_is_critical() {
        let err = AppError::MigrationFailed {
            version: "3".to_string(),
            reason: "syntax error".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Fatal);
        assert_eq!(err.recovery_action(), RecoveryAction::RestoreBackup);
        assert!(err.is_critical());
    }

    #[test]
    fn test_user_messages_hide_details() {
        let err = AppError::DatabaseError {
            message: "SQLITE_BUSY on table books".to_string(),
            source: None,
        };
        let msg = err.user_message();
        assert!(!msg.contains("SQLITE"));
        assert!(msg.contains("database"));
    }

    #[test]
    fn test_not_found_helper() {
        let err = AppError::not_found("Book", "dune");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Record not found: Book with dune");
        assert_eq!(err.user_message(), "The requested book was not found.");
    }

    #[test]
    fn test_invalid_argument_helper() {
        let err = AppError::invalid_argument("filename", "must not be empty");
        assert!(matches!(err, AppError::InvalidArgument { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_database_helper_keeps_source() {
        let inner = io::Error::new(io::ErrorKind::Other, "disk I/O error");
        let err = AppError::database("Query failed", inner);
        assert!(matches!(err, AppError::DatabaseError { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_busy_database_is_retryable() {
        let err = AppError::database("Query failed", io::Error::other("database is locked"));
        assert_eq!(err.severity(), ErrorSeverity::Recoverable);
        assert!(err.is_retryable());
        assert!(!err.is_critical());
    }

    #[test]
    fn test_io_helper_keeps_context() {
        let err = AppError::io(
            "Failed to create /data",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "I/O error: Failed to create /data");
        assert_eq!(err.recovery_action(), RecoveryAction::UserIntervention);
        assert!(err.source().is_some());
    }
}

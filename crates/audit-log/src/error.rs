use thiserror::Error;

/// Errors that can occur when interacting with the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing sink could not be reached. Callers may retry.
    #[error("Audit log unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record could not be decoded.
    #[error("Invalid audit record: {0}")]
    InvalidRecord(String),
}

impl AuditError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AuditError::Unavailable(_) => true,
            AuditError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Result type for audit log operations.
pub type Result<T> = std::result::Result<T, AuditError>;

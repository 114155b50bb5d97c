/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use fleetmon_storage::error::StorageError;
///
/// let err = StorageError::UnexpectedColumnType {
///     column: "kind",
///     expected: "CPU | MEM | DISK",
/// };
/// assert!(err.to_string().contains("kind"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A column contained a value that does not map back to its Rust type.
    #[error("Storage: unexpected value in column '{column}': expected {expected}")]
    UnexpectedColumnType {
        column: &'static str,
        expected: &'static str,
    },

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

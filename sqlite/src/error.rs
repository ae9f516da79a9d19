//! Error types for SQLite storage operations.
//!
//! Provides a unified error type covering database access, record
//! conversion, and schema reconciliation failures.

use thiserror::Error;

/// Errors that can occur while storing or loading records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Converter resolution or record conversion failure.
    #[error("conversion error: {0}")]
    Convert(#[from] rowmap_core::Error),

    /// A planned DDL statement failed to execute.
    #[error("failed to apply '{statement}': {source}")]
    SchemaApply {
        /// The offending statement.
        statement: String,
        /// The underlying database error.
        source: rusqlite::Error,
    },
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

//! Custom error types for the common library
//!
//! This module defines the error type surfaced by the row-store gateway.
//! Callers see a single upstream error regardless of how many retries
//! were attempted internally.

use thiserror::Error;

/// Custom error type for row-store operations
#[derive(Error, Debug)]
pub enum RowStoreError {
    /// Error occurred while talking to the row-store API
    #[error("Row-store transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The row-store API answered with a non-success status
    #[error("Row-store API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The requested row does not exist
    #[error("Row {0} not found")]
    RowNotFound(u32),

    /// No free cell is left in the permissions region of a row
    #[error("No free permission column in row {0}")]
    ColumnsExhausted(u32),

    /// Configuration error
    #[error("Row-store configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with RowStoreError
pub type RowStoreResult<T> = Result<T, RowStoreError>;

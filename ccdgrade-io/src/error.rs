//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Input stream ended inside a record.
    #[error("truncated event record at byte {offset}: {len} of 56 bytes")]
    TruncatedRecord {
        /// Byte offset where the partial record starts.
        offset: u64,
        /// Bytes available for it.
        len: usize,
    },

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] ccdgrade_core::Error),
}

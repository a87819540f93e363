//! Error types for rewind-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Ring or snapshot capacity must be non-zero
    #[error("Capacity must be greater than 0")]
    ZeroCapacity,
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for ALUA target group operations

use thiserror::Error;

/// ALUA target group errors
#[derive(Debug, Error)]
pub enum AluaError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Allocation failure: {0}")]
    OutOfMemory(#[from] std::collections::TryReserveError),

    #[error("Cancelled while waiting for the registry lock")]
    Cancelled,
}

/// Result type for ALUA operations
pub type AluaResult<T> = Result<T, AluaError>;

//! Block layer error types.

use lucid_store::StoreError;
use lucid_types::{CoreErrorKind, ErrorKind};
use thiserror::Error;

/// Errors surfaced by the block manager.
#[derive(Debug, Error)]
pub enum BlockError {
    /// Block failed validation; the messages list every check that failed.
    #[error("Invalid block at height {height}: {errors:?}")]
    InvalidBlock { height: u64, errors: Vec<String> },

    /// More transactions than a block may carry.
    #[error("Too many transactions: {count} > {max}")]
    TooManyTransactions { count: usize, max: usize },

    /// The chain has no block at the height a new block must link to.
    #[error("Previous block not found at height {0}")]
    PreviousBlockNotFound(u64),

    #[error("Block not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreErrorKind for BlockError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBlock { .. }
            | Self::TooManyTransactions { .. }
            | Self::PreviousBlockNotFound(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Store(StoreError::Unavailable(_)) => ErrorKind::StoreUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

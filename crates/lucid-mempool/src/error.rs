//! Mempool error types.

use lucid_store::StoreError;
use lucid_types::{CoreErrorKind, ErrorKind};
use thiserror::Error;

/// Errors surfaced by the transaction processor.
#[derive(Debug, Error)]
pub enum MempoolError {
    /// Transaction id already present in the pool or the chain.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Admission checks failed; messages list every violated rule.
    #[error("Transaction rejected: {errors:?}")]
    Rejected { errors: Vec<String> },

    /// Confirmed balance does not cover value plus fee.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreErrorKind for MempoolError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateTransaction(_) => ErrorKind::DuplicateTransaction,
            Self::Rejected { .. } => ErrorKind::Validation,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Store(StoreError::Unavailable(_)) => ErrorKind::StoreUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

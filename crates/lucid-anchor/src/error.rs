//! Anchoring error types.

use lucid_onchain::ChainClientError;
use lucid_store::StoreError;
use lucid_types::{CoreErrorKind, ErrorKind};
use thiserror::Error;

/// Errors surfaced by the anchor service.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// The manifest is structurally unsound.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Anchoring record not found for session {0}")]
    NotFound(String),

    #[error(transparent)]
    Chain(#[from] ChainClientError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreErrorKind for AnchorError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidManifest(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Chain(e) => e.kind(),
            Self::Store(StoreError::Unavailable(_)) => ErrorKind::StoreUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

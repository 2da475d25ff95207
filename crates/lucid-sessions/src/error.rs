//! Session pipeline error types.

use lucid_crypto::CryptoError;
use lucid_store::StoreError;
use lucid_types::{CoreErrorKind, ErrorKind};
use thiserror::Error;

/// Errors surfaced by the session pipeline.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A checksum or authentication tag did not verify on re-read.
    #[error("Integrity failure: {0}")]
    Integrity(String),

    /// Merkle trees cannot be built over zero chunks.
    #[error("Cannot build Merkle tree with empty chunk list")]
    EmptyChunkList,

    /// Proof requested for a leaf outside the tree.
    #[error("Chunk index {index} out of range (leaf count {leaf_count})")]
    ProofIndexOutOfRange { index: u32, leaf_count: u32 },

    /// A chunk artifact was expected on disk but is missing.
    #[error("Chunk artifact not found: {0}")]
    ChunkNotFound(String),

    /// Cooperative cancellation was signaled mid-stage.
    #[error("Pipeline canceled for session {0}")]
    Canceled(String),

    /// Anchoring submission failed.
    #[error("Anchoring failed: {0}")]
    Anchoring(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreErrorKind for SessionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Integrity(_) | Self::Crypto(CryptoError::DecryptionFailed(_)) => {
                ErrorKind::Integrity
            }
            Self::EmptyChunkList | Self::ProofIndexOutOfRange { .. } => ErrorKind::Validation,
            Self::ChunkNotFound(_) => ErrorKind::NotFound,
            Self::Canceled(_) => ErrorKind::PipelineCanceled,
            Self::Store(StoreError::Unavailable(_)) => ErrorKind::StoreUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

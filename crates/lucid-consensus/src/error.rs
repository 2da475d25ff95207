//! Consensus error types.

use lucid_store::StoreError;
use lucid_types::{CoreErrorKind, ErrorKind};
use thiserror::Error;

/// Errors surfaced by the consensus engine and the work ledger.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Task-proof signature does not verify against the proof fields.
    #[error("Invalid task proof signature from {node_id} at slot {slot}")]
    InvalidProofSignature { node_id: String, slot: u64 },

    /// Leader selection exceeded its slot budget.
    #[error("Leader selection for slot {0} timed out")]
    SlotTimeout(u64),

    /// A schedule already exists for this slot (runSlot is single-writer).
    #[error("Schedule already persisted for slot {0}")]
    SlotAlreadyScheduled(u64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreErrorKind for ConsensusError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidProofSignature { .. } => ErrorKind::Validation,
            Self::SlotAlreadyScheduled(_) => ErrorKind::DuplicateTransaction,
            Self::SlotTimeout(_) => ErrorKind::Internal,
            Self::Store(StoreError::Unavailable(_)) => ErrorKind::StoreUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

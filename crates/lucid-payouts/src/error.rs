//! Payout error types.

use lucid_store::StoreError;
use lucid_types::{CoreErrorKind, ErrorKind};
use thiserror::Error;

/// Errors surfaced by the payout router.
#[derive(Debug, Error)]
pub enum PayoutError {
    /// KYC-gated payout without valid compliance material.
    #[error("KYC rejected for {recipient}: {reason}")]
    KycRejected { recipient: String, reason: String },

    /// TRON account resources cannot cover the batch.
    #[error("Insufficient energy: need {required}, have {available}")]
    InsufficientEnergy { required: u64, available: u64 },

    /// Recipient is not a TRON base58 address.
    #[error("Invalid TRON address: {0}")]
    InvalidAddress(String),

    /// Amount outside [1.0, 10000.0] USDT.
    #[error("Payout amount {amount} outside [{min}, {max}] USDT")]
    AmountOutOfRange { amount: f64, min: f64, max: f64 },

    /// Request cannot change state (already processing or terminal).
    #[error("Payout {payout_id} is {status}, cannot {action}")]
    InvalidState {
        payout_id: String,
        status: String,
        action: &'static str,
    },

    #[error("Payout not found: {0}")]
    NotFound(String),

    /// TRON node rejected the submission or is unreachable.
    #[error("TRON client error: {0}")]
    Tron(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreErrorKind for PayoutError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::KycRejected { .. } => ErrorKind::KycRejected,
            Self::InsufficientEnergy { .. } => ErrorKind::InsufficientEnergy,
            Self::InvalidAddress(_) | Self::AmountOutOfRange { .. } | Self::InvalidState { .. } => {
                ErrorKind::Validation
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Tron(_) => ErrorKind::ChainUnavailable,
            Self::Store(StoreError::Unavailable(_)) => ErrorKind::StoreUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for PayoutError {
    fn from(e: reqwest::Error) -> Self {
        Self::Tron(e.to_string())
    }
}

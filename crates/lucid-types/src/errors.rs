//! # Shared Error Kinds
//!
//! The stable error taxonomy the REST shell maps to `LUCID_ERR_*` codes.
//! Component crates define their own `thiserror` enums and implement
//! [`CoreErrorKind::kind`] so the shell can classify any failure without
//! knowing the component.

use thiserror::Error;

/// Cross-component failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Checksum or Merkle verification failed.
    Integrity,
    /// Structural or semantic invariant violated.
    Validation,
    /// Primary-chain gas estimate above the circuit breaker.
    GasLimitExceeded,
    /// KYC-gated payout lacks or fails compliance material.
    KycRejected,
    /// TRON resources insufficient for a batch.
    InsufficientEnergy,
    /// Transaction value + fee exceeds the computed balance.
    InsufficientBalance,
    /// Transaction id already seen.
    DuplicateTransaction,
    /// RPC unreachable after retries.
    ChainUnavailable,
    /// Document store driver reports connection loss.
    StoreUnavailable,
    /// Cooperative cancellation signaled mid-stage.
    PipelineCanceled,
    /// Requested record does not exist.
    NotFound,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Stable wire code for the REST shell's error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Integrity => "LUCID_ERR_5001",
            Self::Validation => "LUCID_ERR_4000",
            Self::GasLimitExceeded => "LUCID_ERR_5002",
            Self::KycRejected => "LUCID_ERR_4030",
            Self::InsufficientEnergy => "LUCID_ERR_5030",
            Self::InsufficientBalance => "LUCID_ERR_4020",
            Self::DuplicateTransaction => "LUCID_ERR_4090",
            Self::ChainUnavailable => "LUCID_ERR_5031",
            Self::StoreUnavailable => "LUCID_ERR_5032",
            Self::PipelineCanceled => "LUCID_ERR_4990",
            Self::NotFound => "LUCID_ERR_4040",
            Self::Internal => "LUCID_ERR_5000",
        }
    }

    /// HTTP status the shell responds with for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation | Self::KycRejected => 400,
            Self::NotFound => 404,
            Self::DuplicateTransaction => 409,
            Self::InsufficientBalance | Self::GasLimitExceeded => 400,
            Self::PipelineCanceled => 499,
            _ => 500,
        }
    }
}

/// Implemented by every component error enum.
pub trait CoreErrorKind {
    fn kind(&self) -> ErrorKind;
}

/// Cancellation error shared by every long-running operation.
#[derive(Debug, Clone, Error)]
#[error("operation canceled")]
pub struct Canceled;

impl CoreErrorKind for Canceled {
    fn kind(&self) -> ErrorKind {
        ErrorKind::PipelineCanceled
    }
}

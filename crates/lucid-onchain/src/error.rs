//! Chain client error types.

use lucid_types::{CoreErrorKind, ErrorKind};
use thiserror::Error;

/// Errors surfaced by the on-chain client.
#[derive(Debug, Error)]
pub enum ChainClientError {
    /// Gas estimate above the circuit breaker; nothing was submitted.
    #[error("Gas estimate {estimated} exceeds limit {limit}")]
    GasLimitExceeded { estimated: u64, limit: u64 },

    /// The node rejected the call.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Transport failure talking to the node.
    #[error("Chain unavailable: {0}")]
    Unavailable(String),

    /// The node answered with something unparseable.
    #[error("Malformed RPC response: {0}")]
    InvalidResponse(String),

    /// A hex field (hash, address) failed to decode.
    #[error("Invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

impl CoreErrorKind for ChainClientError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::GasLimitExceeded { .. } => ErrorKind::GasLimitExceeded,
            Self::Unavailable(_) => ErrorKind::ChainUnavailable,
            Self::InvalidField { .. } => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for ChainClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

//! Payout domain entities.
//!
//! Defined here, not in the shared types crate: the payout side owns its
//! own model and the chain core never sees these shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum payout: 1 USDT.
pub const MIN_PAYOUT_USDT: f64 = 1.0;

/// Maximum payout: 10 000 USDT.
pub const MAX_PAYOUT_USDT: f64 = 10_000.0;

/// Maximum requests per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Validates a TRON base58 address: `T` followed by 33 alphanumerics.
pub fn is_tron_address(address: &str) -> bool {
    address.len() == 34
        && address.starts_with('T')
        && address[1..].bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Which logical router dispatches a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterType {
    /// `PayoutRouterV0`: end-user payouts without KYC.
    NonKyc,
    /// `PayoutRouterKYC`: compliance-gated payouts.
    KycGated,
}

/// Payout lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Closed set of payout context fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PayoutContext {
    pub node_id: Option<String>,
    pub session_id: Option<String>,
}

/// One payout request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub payout_id: String,
    pub recipient_address: String,
    /// USDT amount; six decimal places are significant on the wire.
    pub amount_usdt: f64,
    pub router_type: RouterType,
    pub reason_code: String,
    /// Required (non-empty) for KYC-gated payouts.
    pub kyc_hash: Option<String>,
    /// Compliance signature over the KYC hash; required for KYC-gated
    /// payouts.
    pub compliance_sig: Option<String>,
    #[serde(default)]
    pub context: PayoutContext,
    pub created_at: DateTime<Utc>,
    pub status: PayoutStatus,
    pub processed_at: Option<DateTime<Utc>>,
    /// Payment-chain transaction, set when the containing batch completes.
    pub txid: Option<String>,
    pub error: Option<String>,
}

impl PayoutRequest {
    /// Micro-USDT (six decimals) for the TRC-20 wire format.
    pub fn amount_micro(&self) -> u64 {
        (self.amount_usdt * 1_000_000.0).round() as u64
    }
}

/// One batch of payouts, atomic with respect to status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutBatch {
    pub batch_id: String,
    pub router_type: RouterType,
    pub payout_ids: Vec<String>,
    pub total_amount_usdt: f64,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub txid: Option<String>,
    pub status: PayoutStatus,
}

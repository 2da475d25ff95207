//! Anchoring verification primitives.
//!
//! Exported separately from the service so test harnesses and the REST
//! shell can verify transactions and roots without submission rights.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use lucid_onchain::{OnChainClient, TxStatus};

use crate::error::AnchorError;
use crate::storage::AnchoringStorage;

/// Result of verifying a session's anchoring.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub status: Option<String>,
    pub block_height: Option<u64>,
    pub transaction_id: Option<String>,
    pub merkle_root_matches: bool,
    pub reason: Option<String>,
}

impl VerificationResult {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            status: None,
            block_height: None,
            transaction_id: None,
            merkle_root_matches: false,
            reason: Some(reason.into()),
        }
    }
}

/// Read-only verifier over the anchor store and the chain client.
pub struct AnchorVerifier<C: OnChainClient> {
    client: Arc<C>,
    storage: Arc<AnchoringStorage>,
}

impl<C: OnChainClient> AnchorVerifier<C> {
    pub fn new(client: Arc<C>, storage: Arc<AnchoringStorage>) -> Self {
        Self { client, storage }
    }

    /// Is this transaction confirmed on the primary chain?
    pub async fn verify_transaction(&self, txid: &str) -> Result<bool, AnchorError> {
        let (status, _, _) = self.client.get_transaction_status(txid).await?;
        Ok(status == TxStatus::Success)
    }

    /// Does the stored root for this session match, case-insensitively?
    pub async fn verify_merkle_root(
        &self,
        session_id: &str,
        expected_root: &str,
    ) -> Result<bool, AnchorError> {
        let Some(anchor) = self.storage.anchor_for_session(session_id).await? else {
            return Ok(false);
        };
        Ok(anchor.merkle_root.eq_ignore_ascii_case(expected_root))
    }

    /// Full verification: chain confirmation plus optional root check.
    /// When the chain client fails, falls back to the locally stored
    /// status and block number.
    pub async fn verify_anchoring(
        &self,
        session_id: &str,
        expected_merkle_root: Option<&str>,
    ) -> Result<VerificationResult, AnchorError> {
        let Some(anchor) = self.storage.anchor_for_session(session_id).await? else {
            return Ok(VerificationResult::rejected("anchoring record not found"));
        };
        if anchor.txid.is_empty() {
            return Ok(VerificationResult::rejected("no transaction id recorded"));
        }

        let (status_str, block_height, confirmed) =
            match self.client.get_transaction_status(&anchor.txid).await {
                Ok((status, block, _)) => {
                    let name = match status {
                        TxStatus::Success => "confirmed",
                        TxStatus::Failed => "failed",
                        TxStatus::Pending => "pending",
                    };
                    (name.to_string(), block, status == TxStatus::Success)
                }
                Err(e) => {
                    warn!(session_id, error = %e, "chain unavailable, using stored anchor state");
                    (
                        anchor.status.as_str().to_string(),
                        anchor.block_number,
                        anchor.status == lucid_types::AnchorStatus::Confirmed,
                    )
                }
            };

        let merkle_root_matches = match expected_merkle_root {
            Some(expected) => anchor.merkle_root.eq_ignore_ascii_case(expected),
            None => true,
        };

        Ok(VerificationResult {
            verified: confirmed && merkle_root_matches,
            status: Some(status_str),
            block_height,
            transaction_id: Some(anchor.txid),
            merkle_root_matches,
            reason: None,
        })
    }
}

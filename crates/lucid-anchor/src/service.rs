//! Anchor service.
//!
//! Submission, status with on-demand confirmation sweeps, and the service
//! status aggregate. Also implements the session pipeline's anchoring port
//! so the orchestrator can drive it without knowing the chain client.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use lucid_onchain::{OnChainClient, SessionRegistration, TxStatus};
use lucid_sessions::{AnchorSubmission, SessionAnchoring};
use lucid_store::DocumentStore;
use lucid_types::{
    generate_anchoring_id, AnchorStatus, SessionAnchor, SessionMetadata,
};

use crate::error::AnchorError;
use crate::manifest::ManifestBuilder;
use crate::storage::{AnchoringStatistics, AnchoringStorage};

/// Result returned to the submitter.
#[derive(Debug, Clone, Serialize)]
pub struct AnchoringResult {
    pub anchoring_id: String,
    pub session_id: String,
    pub status: AnchorStatus,
    pub transaction_id: String,
    pub block_number: Option<u64>,
    pub submitted_at: DateTime<Utc>,
}

/// Status view of one session's anchoring.
#[derive(Debug, Clone, Serialize)]
pub struct AnchoringStatus {
    pub session_id: String,
    pub anchoring_id: String,
    pub status: AnchorStatus,
    pub transaction_id: String,
    pub block_height: Option<u64>,
    pub submitted_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub merkle_root: String,
}

/// Aggregate health of the anchoring subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub total_anchorings: u64,
    pub pending_anchorings: u64,
    pub confirmed_anchorings: u64,
    pub failed_anchorings: u64,
    pub avg_confirmation_secs: f64,
}

/// Anchoring orchestration over the chain client and the store.
pub struct AnchorService<C: OnChainClient> {
    client: Arc<C>,
    storage: AnchoringStorage,
    manifest_builder: ManifestBuilder,
    /// Whether a pending status query triggers a confirmation sweep first.
    sweep_on_status: bool,
}

impl<C: OnChainClient> AnchorService<C> {
    pub fn new(client: Arc<C>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            client,
            storage: AnchoringStorage::new(store),
            manifest_builder: ManifestBuilder::new(),
            sweep_on_status: true,
        }
    }

    /// Disables the implicit sweep on status queries.
    pub fn without_status_sweep(mut self) -> Self {
        self.sweep_on_status = false;
        self
    }

    pub fn storage(&self) -> &AnchoringStorage {
        &self.storage
    }

    /// Declares indexes; call once at startup.
    pub async fn initialize(&self) -> Result<(), AnchorError> {
        self.storage.initialize().await
    }

    /// Anchors a session: persists the manifest, submits `registerSession`
    /// and records a pending anchor.
    ///
    /// Idempotent per session: a live (pending or confirmed) anchor is
    /// returned as-is; only a failed anchor is replaced by a fresh
    /// submission.
    pub async fn anchor_session(
        &self,
        session_id: &str,
        owner_address: &str,
        merkle_root: &str,
        chunk_count: u32,
        metadata: Option<SessionMetadata>,
    ) -> Result<AnchoringResult, AnchorError> {
        if let Some(existing) = self.storage.anchor_for_session(session_id).await? {
            if existing.status != AnchorStatus::Failed {
                info!(session_id, anchoring_id = %existing.anchoring_id, "anchor already live");
                return Ok(AnchoringResult {
                    anchoring_id: existing.anchoring_id,
                    session_id: existing.session_id,
                    status: existing.status,
                    transaction_id: existing.txid,
                    block_number: existing.block_number,
                    submitted_at: existing.submitted_at,
                });
            }
        }

        let started_at = Utc::now();
        let manifest = self.manifest_builder.build_manifest(
            session_id,
            owner_address,
            merkle_root,
            Vec::new(), // chunk records live in their own collection
            started_at,
            None,
            metadata.unwrap_or_default(),
        );
        self.manifest_builder.validate_manifest(&manifest)?;
        self.storage.store_manifest(&manifest).await?;

        let outcome = self
            .client
            .register_session(&SessionRegistration {
                session_id: session_id.to_string(),
                manifest_hash: manifest.manifest_hash.clone(),
                started_at_unix: started_at.timestamp() as u64,
                owner: owner_address.to_string(),
                merkle_root: merkle_root.to_string(),
                chunk_count: chunk_count as u64,
            })
            .await?;

        let anchor = SessionAnchor {
            anchoring_id: generate_anchoring_id(),
            session_id: session_id.to_string(),
            txid: outcome.txid.clone(),
            block_number: None,
            status: AnchorStatus::Pending,
            merkle_root: merkle_root.to_string(),
            submitted_at: Utc::now(),
            confirmed_at: None,
            gas_used: None,
            error: None,
        };
        self.storage.replace_anchor(&anchor).await?;

        info!(session_id, txid = %anchor.txid, "session anchored, awaiting confirmation");
        Ok(AnchoringResult {
            anchoring_id: anchor.anchoring_id,
            session_id: anchor.session_id,
            status: anchor.status,
            transaction_id: anchor.txid,
            block_number: None,
            submitted_at: anchor.submitted_at,
        })
    }

    /// Anchoring status for a session. A pending record triggers a
    /// confirmation sweep first (unless disabled).
    pub async fn get_anchoring_status(
        &self,
        session_id: &str,
    ) -> Result<Option<AnchoringStatus>, AnchorError> {
        let Some(record) = self.storage.anchor_for_session(session_id).await? else {
            return Ok(None);
        };

        if record.status == AnchorStatus::Pending && self.sweep_on_status {
            self.check_anchor_confirmations().await?;
        }

        let record = self
            .storage
            .anchor_for_session(session_id)
            .await?
            .ok_or_else(|| AnchorError::NotFound(session_id.to_string()))?;

        Ok(Some(AnchoringStatus {
            session_id: record.session_id,
            anchoring_id: record.anchoring_id,
            status: record.status,
            transaction_id: record.txid,
            block_height: record.block_number,
            submitted_at: record.submitted_at,
            confirmed_at: record.confirmed_at,
            merkle_root: record.merkle_root,
        }))
    }

    /// Polls every pending anchor once. Returns how many reached a
    /// terminal state.
    pub async fn check_anchor_confirmations(&self) -> Result<u64, AnchorError> {
        let mut settled = 0;
        for anchor in self.storage.pending_anchors().await? {
            match self.client.get_transaction_status(&anchor.txid).await {
                Ok((TxStatus::Success, block_number, gas_used)) => {
                    self.storage
                        .mark_confirmed(
                            &anchor.anchoring_id,
                            block_number.unwrap_or_default(),
                            gas_used,
                        )
                        .await?;
                    settled += 1;
                    info!(
                        session_id = %anchor.session_id,
                        block_number,
                        "anchor confirmed"
                    );
                }
                Ok((TxStatus::Failed, _, _)) => {
                    self.storage
                        .mark_failed(&anchor.anchoring_id, "transaction reverted")
                        .await?;
                    settled += 1;
                    warn!(session_id = %anchor.session_id, "anchor failed on chain");
                }
                Ok((TxStatus::Pending, _, _)) => {}
                Err(e) => {
                    // Transient chain trouble; the next sweep retries.
                    warn!(session_id = %anchor.session_id, error = %e, "confirmation poll failed");
                }
            }
        }
        Ok(settled)
    }

    /// Aggregate service status.
    pub async fn service_status(&self) -> Result<ServiceStatus, AnchorError> {
        let AnchoringStatistics {
            total,
            pending,
            confirmed,
            failed,
            avg_confirmation_secs,
        } = self.storage.statistics().await?;
        Ok(ServiceStatus {
            total_anchorings: total,
            pending_anchorings: pending,
            confirmed_anchorings: confirmed,
            failed_anchorings: failed,
            avg_confirmation_secs,
        })
    }
}

#[async_trait]
impl<C: OnChainClient> SessionAnchoring for AnchorService<C> {
    async fn anchor_session(
        &self,
        session_id: &str,
        owner_address: &str,
        merkle_root: &str,
        chunk_count: u32,
        metadata: Option<SessionMetadata>,
    ) -> Result<AnchorSubmission, String> {
        let result = AnchorService::anchor_session(
            self,
            session_id,
            owner_address,
            merkle_root,
            chunk_count,
            metadata,
        )
        .await
        .map_err(|e| e.to_string())?;
        Ok(AnchorSubmission {
            anchoring_id: result.anchoring_id,
            session_id: result.session_id,
            transaction_id: result.transaction_id,
            status: result.status,
            submitted_at: result.submitted_at,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lucid_onchain::{ChainClientError, ChunkCommitment, TxOutcome};
    use lucid_store::MemoryDocumentStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted chain client: records calls and serves receipts on demand.
    pub(crate) struct ScriptedChain {
        pub registrations: Mutex<Vec<SessionRegistration>>,
        pub receipts: Mutex<HashMap<String, (TxStatus, Option<u64>, Option<u64>)>>,
        pub next_txid: Mutex<String>,
    }

    impl ScriptedChain {
        pub fn new() -> Self {
            Self {
                registrations: Mutex::new(Vec::new()),
                receipts: Mutex::new(HashMap::new()),
                next_txid: Mutex::new("0xdeadbeef".into()),
            }
        }

        pub fn deliver_receipt(&self, txid: &str, status: TxStatus, block: u64) {
            self.receipts
                .lock()
                .unwrap()
                .insert(txid.into(), (status, Some(block), Some(21_000)));
        }
    }

    #[async_trait]
    impl OnChainClient for ScriptedChain {
        async fn register_session(
            &self,
            registration: &SessionRegistration,
        ) -> Result<TxOutcome, ChainClientError> {
            self.registrations.lock().unwrap().push(registration.clone());
            Ok(TxOutcome {
                txid: self.next_txid.lock().unwrap().clone(),
                block_number: None,
                gas_used: None,
                status: TxStatus::Pending,
            })
        }

        async fn store_chunk_metadata(
            &self,
            _commitment: &ChunkCommitment,
        ) -> Result<TxOutcome, ChainClientError> {
            Ok(TxOutcome {
                txid: "0xchunk".into(),
                block_number: None,
                gas_used: None,
                status: TxStatus::Pending,
            })
        }

        async fn get_transaction_status(
            &self,
            txid: &str,
        ) -> Result<(TxStatus, Option<u64>, Option<u64>), ChainClientError> {
            Ok(self
                .receipts
                .lock()
                .unwrap()
                .get(txid)
                .copied()
                .unwrap_or((TxStatus::Pending, None, None)))
        }
    }

    const OWNER: &str = "0x1111111111111111111111111111111111111111";

    async fn service() -> (AnchorService<ScriptedChain>, Arc<ScriptedChain>) {
        let chain = Arc::new(ScriptedChain::new());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let service = AnchorService::new(Arc::clone(&chain), store);
        service.initialize().await.unwrap();
        (service, chain)
    }

    #[tokio::test]
    async fn submit_then_confirm_flow() {
        let (service, chain) = service().await;
        let root = "ab".repeat(32);

        let result = service
            .anchor_session("sess-1", OWNER, &root, 3, None)
            .await
            .unwrap();
        assert_eq!(result.status, AnchorStatus::Pending);
        assert_eq!(result.transaction_id, "0xdeadbeef");

        // The registration carried the exact six-argument shape.
        let regs = chain.registrations.lock().unwrap();
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].session_id, "sess-1");
        assert_eq!(regs[0].owner, OWNER);
        assert_eq!(regs[0].merkle_root, root);
        assert_eq!(regs[0].chunk_count, 3);
        drop(regs);

        chain.deliver_receipt("0xdeadbeef", TxStatus::Success, 12_345);
        let status = service
            .get_anchoring_status("sess-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, AnchorStatus::Confirmed);
        assert_eq!(status.block_height, Some(12_345));
        assert!(status.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn resubmission_is_idempotent() {
        let (service, chain) = service().await;
        let root = "cd".repeat(32);

        let first = service
            .anchor_session("sess-2", OWNER, &root, 1, None)
            .await
            .unwrap();
        let second = service
            .anchor_session("sess-2", OWNER, &root, 1, None)
            .await
            .unwrap();
        assert_eq!(first.anchoring_id, second.anchoring_id);
        assert_eq!(chain.registrations.lock().unwrap().len(), 1);

        // One session record regardless of submissions.
        let manifest = service.storage.get_manifest("sess-2").await.unwrap();
        assert!(manifest.is_some());
    }

    #[tokio::test]
    async fn failed_anchor_is_resubmitted() {
        let (service, chain) = service().await;
        let root = "ef".repeat(32);

        let first = service
            .anchor_session("sess-3", OWNER, &root, 1, None)
            .await
            .unwrap();
        chain.deliver_receipt(&first.transaction_id, TxStatus::Failed, 0);
        let status = service
            .get_anchoring_status("sess-3")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, AnchorStatus::Failed);

        *chain.next_txid.lock().unwrap() = "0xsecond".into();
        let retry = service
            .anchor_session("sess-3", OWNER, &root, 1, None)
            .await
            .unwrap();
        assert_ne!(retry.anchoring_id, first.anchoring_id);
        assert_eq!(retry.transaction_id, "0xsecond");
    }

    #[tokio::test]
    async fn invalid_owner_is_rejected_before_submission() {
        let (service, chain) = service().await;
        let err = service
            .anchor_session("sess-4", "not-an-address", &"ab".repeat(32), 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnchorError::InvalidManifest(_)));
        assert!(chain.registrations.lock().unwrap().is_empty());
    }
}

//! Node work ledger.
//!
//! Append-only write layer over the `task_proofs` collection used by node
//! software to record operational work. Signatures are verified before
//! anything is stored. Duplicate `(node, slot, type)` tuples are accepted;
//! they aggregate in the value dimension at tally time.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::debug;

use lucid_crypto::signatures::task_proof_signature;
use lucid_store::{DocumentStore, Filter, FindOptions, IndexSpec};
use lucid_types::{NodeWorkMetrics, TaskProof};

use crate::credits::{bytes_transferred, session_equivalents};
use crate::error::ConsensusError;

pub const TASK_PROOFS: &str = "task_proofs";
const NODE_METRICS: &str = "node_work_metrics";

/// Renders the type tag exactly as it appears in stored documents.
fn proof_type_tag(proof: &TaskProof) -> String {
    serde_json::to_value(proof.proof_type)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Computes the signature a well-formed proof must carry.
pub fn expected_proof_signature(proof: &TaskProof) -> String {
    let value_json = serde_json::to_string(&proof.value).unwrap_or_default();
    task_proof_signature(
        &proof.node_id,
        proof.slot,
        &proof_type_tag(proof),
        &value_json,
        &proof.timestamp,
    )
}

/// Append-only task-proof ledger.
pub struct WorkLedger {
    store: Arc<dyn DocumentStore>,
}

impl WorkLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Declares indexes and the shard key.
    pub async fn initialize(&self) -> Result<(), ConsensusError> {
        self.store
            .ensure_index(TASK_PROOFS, IndexSpec::plain(&["slot", "node_id"]))
            .await?;
        self.store
            .ensure_index(TASK_PROOFS, IndexSpec::plain(&["type"]))
            .await?;
        self.store
            .declare_shard_key(TASK_PROOFS, &["slot", "node_id"])
            .await?;
        Ok(())
    }

    /// Verifies and appends one proof, updating the per-node roll-up.
    pub async fn append(&self, proof: &TaskProof) -> Result<(), ConsensusError> {
        if proof.signature != expected_proof_signature(proof) {
            return Err(ConsensusError::InvalidProofSignature {
                node_id: proof.node_id.clone(),
                slot: proof.slot,
            });
        }

        let mut doc = serde_json::to_value(proof)?;
        doc["_id"] = json!(uuid::Uuid::new_v4().to_string());
        self.store.insert(TASK_PROOFS, doc).await?;
        self.update_node_metrics(proof).await?;

        debug!(node_id = %proof.node_id, slot = proof.slot, "task proof appended");
        Ok(())
    }

    async fn update_node_metrics(&self, proof: &TaskProof) -> Result<(), ConsensusError> {
        let mut metrics = self
            .store
            .get(NODE_METRICS, &proof.node_id)
            .await?
            .map(|mut doc| {
                doc.as_object_mut().map(|m| m.remove("_id"));
                serde_json::from_value::<NodeWorkMetrics>(doc).unwrap_or_default()
            })
            .unwrap_or_default();

        metrics.node_id = proof.node_id.clone();
        metrics.sessions_relayed += session_equivalents(&proof.value);
        metrics.bytes_relayed += bytes_transferred(&proof.value);
        match proof.value {
            lucid_types::TaskProofValue::ChunksStored { .. } => {
                metrics.storage_challenges_passed += 1;
            }
            lucid_types::TaskProofValue::ValidatedSessions { .. } => {
                metrics.validation_signatures += 1;
            }
            lucid_types::TaskProofValue::UptimeSeconds { uptime_seconds } => {
                metrics.uptime_seconds += uptime_seconds;
            }
            lucid_types::TaskProofValue::BytesTransferred { .. } => {}
        }
        metrics.last_updated = Some(Utc::now());

        let mut doc = serde_json::to_value(&metrics)?;
        doc["_id"] = json!(proof.node_id);
        self.store
            .upsert(NODE_METRICS, &proof.node_id, doc)
            .await?;
        Ok(())
    }

    /// Proofs within a slot window, for the credit tally.
    pub async fn proofs_in_window(
        &self,
        start_slot: u64,
        end_slot: u64,
    ) -> Result<Vec<TaskProof>, ConsensusError> {
        let docs = self
            .store
            .find(
                TASK_PROOFS,
                Filter::And(vec![
                    Filter::Gte("slot".into(), json!(start_slot)),
                    Filter::Lte("slot".into(), json!(end_slot)),
                ]),
                FindOptions::default(),
            )
            .await?;
        let mut proofs = Vec::with_capacity(docs.len());
        for mut doc in docs {
            if let Some(map) = doc.as_object_mut() {
                map.remove("_id");
            }
            proofs.push(serde_json::from_value(doc)?);
        }
        Ok(proofs)
    }

    /// Current roll-up for one node.
    pub async fn node_metrics(
        &self,
        node_id: &str,
    ) -> Result<Option<NodeWorkMetrics>, ConsensusError> {
        Ok(self
            .store
            .get(NODE_METRICS, node_id)
            .await?
            .map(|mut doc| {
                doc.as_object_mut().map(|m| m.remove("_id"));
                serde_json::from_value(doc)
            })
            .transpose()?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use lucid_store::MemoryDocumentStore;
    use lucid_types::{TaskProofType, TaskProofValue};

    pub(crate) fn signed_proof(
        node: &str,
        slot: u64,
        proof_type: TaskProofType,
        value: TaskProofValue,
    ) -> TaskProof {
        let mut proof = TaskProof {
            node_id: node.into(),
            pool_id: None,
            slot,
            proof_type,
            value,
            signature: String::new(),
            timestamp: Utc::now(),
        };
        proof.signature = expected_proof_signature(&proof);
        proof
    }

    async fn ledger() -> WorkLedger {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let l = WorkLedger::new(store);
        l.initialize().await.unwrap();
        l
    }

    #[tokio::test]
    async fn valid_proof_is_appended() {
        let l = ledger().await;
        let proof = signed_proof(
            "node_001",
            1000,
            TaskProofType::RelayBandwidth,
            TaskProofValue::BytesTransferred {
                bytes_transferred: 5_000_000,
            },
        );
        l.append(&proof).await.unwrap();
        let proofs = l.proofs_in_window(1000, 1000).await.unwrap();
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].node_id, "node_001");
    }

    #[tokio::test]
    async fn forged_signature_is_rejected() {
        let l = ledger().await;
        let mut proof = signed_proof(
            "node_001",
            1000,
            TaskProofType::UptimeBeacon,
            TaskProofValue::UptimeSeconds {
                uptime_seconds: 3600,
            },
        );
        proof.slot = 1001; // signature no longer covers the fields
        let err = l.append(&proof).await.unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidProofSignature { .. }));
    }

    #[tokio::test]
    async fn duplicate_slot_and_type_proofs_aggregate() {
        let l = ledger().await;
        for bytes in [1_000_000u64, 2_000_000] {
            let proof = signed_proof(
                "node_001",
                1000,
                TaskProofType::RelayBandwidth,
                TaskProofValue::BytesTransferred {
                    bytes_transferred: bytes,
                },
            );
            l.append(&proof).await.unwrap();
        }
        assert_eq!(l.proofs_in_window(1000, 1000).await.unwrap().len(), 2);
        let metrics = l.node_metrics("node_001").await.unwrap().unwrap();
        assert_eq!(metrics.bytes_relayed, 3_000_000);
    }

    #[tokio::test]
    async fn node_metrics_roll_up_by_kind() {
        let l = ledger().await;
        l.append(&signed_proof(
            "node_002",
            1,
            TaskProofType::ValidationSignature,
            TaskProofValue::ValidatedSessions {
                validated_sessions: 5,
            },
        ))
        .await
        .unwrap();
        l.append(&signed_proof(
            "node_002",
            2,
            TaskProofType::UptimeBeacon,
            TaskProofValue::UptimeSeconds {
                uptime_seconds: 7200,
            },
        ))
        .await
        .unwrap();

        let metrics = l.node_metrics("node_002").await.unwrap().unwrap();
        assert_eq!(metrics.validation_signatures, 1);
        assert_eq!(metrics.uptime_seconds, 7200);
        assert_eq!(metrics.sessions_relayed, 5 + 2);
    }
}

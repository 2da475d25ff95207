//! Anchoring record persistence.
//!
//! Owns `session_anchorings` and the `sessions` manifest collection.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use lucid_store::{Collection, DocumentStore, Filter, FindOptions, IndexSpec, SortOrder};
use lucid_types::{AnchorStatus, SessionAnchor, SessionManifest};

use crate::error::AnchorError;

pub const SESSION_ANCHORINGS: &str = "session_anchorings";
pub const SESSIONS: &str = "sessions";

/// Aggregate counters for the service status surface.
#[derive(Debug, Clone, Default)]
pub struct AnchoringStatistics {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub failed: u64,
    /// Mean seconds from submission to confirmation, over confirmed anchors.
    pub avg_confirmation_secs: f64,
}

/// Typed access to the anchoring collections.
pub struct AnchoringStorage {
    anchors: Collection<SessionAnchor>,
    sessions: Collection<SessionManifest>,
}

impl AnchoringStorage {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            anchors: Collection::new(Arc::clone(&store), SESSION_ANCHORINGS),
            sessions: Collection::new(store, SESSIONS),
        }
    }

    /// Declares indexes and shard keys.
    pub async fn initialize(&self) -> Result<(), AnchorError> {
        self.anchors.ensure_index(IndexSpec::unique(&["session_id"])).await?;
        self.anchors.ensure_index(IndexSpec::plain(&["status"])).await?;
        self.anchors.ensure_index(IndexSpec::plain(&["txid"])).await?;
        self.anchors.ensure_index(IndexSpec::plain(&["submitted_at"])).await?;
        self.anchors
            .ensure_index(IndexSpec::plain(&["session_id", "status"]))
            .await?;
        self.sessions.ensure_index(IndexSpec::unique(&["session_id"])).await?;
        self.sessions
            .declare_shard_key(&["owner_address", "started_at"])
            .await?;
        Ok(())
    }

    /// Upserts the session manifest (idempotent by session id).
    pub async fn store_manifest(&self, manifest: &SessionManifest) -> Result<(), AnchorError> {
        self.sessions.upsert(&manifest.session_id, manifest).await?;
        Ok(())
    }

    pub async fn get_manifest(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionManifest>, AnchorError> {
        Ok(self.sessions.get(session_id).await?)
    }

    /// Inserts a fresh anchoring record.
    pub async fn store_anchor(&self, anchor: &SessionAnchor) -> Result<(), AnchorError> {
        self.anchors.insert(&anchor.anchoring_id, anchor).await?;
        Ok(())
    }

    /// Replaces an existing anchoring record (re-anchor after failure).
    pub async fn replace_anchor(&self, anchor: &SessionAnchor) -> Result<(), AnchorError> {
        self.anchors
            .delete(Filter::eq("session_id", anchor.session_id.as_str()))
            .await?;
        self.anchors.insert(&anchor.anchoring_id, anchor).await?;
        Ok(())
    }

    pub async fn anchor_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionAnchor>, AnchorError> {
        Ok(self
            .anchors
            .find_one(Filter::eq("session_id", session_id), FindOptions::default())
            .await?)
    }

    /// All anchors currently awaiting confirmation.
    pub async fn pending_anchors(&self) -> Result<Vec<SessionAnchor>, AnchorError> {
        Ok(self
            .anchors
            .find(
                Filter::eq("status", "pending"),
                FindOptions::sorted_by("submitted_at", SortOrder::Ascending),
            )
            .await?)
    }

    /// Marks an anchor confirmed.
    pub async fn mark_confirmed(
        &self,
        anchoring_id: &str,
        block_number: u64,
        gas_used: Option<u64>,
    ) -> Result<(), AnchorError> {
        self.anchors
            .update(
                Filter::eq("_id", anchoring_id),
                json!({
                    "status": AnchorStatus::Confirmed.as_str(),
                    "confirmed_at": Utc::now(),
                    "block_number": block_number,
                    "gas_used": gas_used,
                }),
            )
            .await?;
        Ok(())
    }

    /// Marks an anchor failed.
    pub async fn mark_failed(&self, anchoring_id: &str, error: &str) -> Result<(), AnchorError> {
        self.anchors
            .update(
                Filter::eq("_id", anchoring_id),
                json!({
                    "status": AnchorStatus::Failed.as_str(),
                    "error": error,
                }),
            )
            .await?;
        Ok(())
    }

    /// Counts by status plus the mean confirmation delta.
    pub async fn statistics(&self) -> Result<AnchoringStatistics, AnchorError> {
        let groups = self
            .anchors
            .store()
            .group_stats(SESSION_ANCHORINGS, Filter::All, "status", None)
            .await?;
        let mut stats = AnchoringStatistics {
            total: groups.values().map(|g| g.count).sum(),
            pending: groups.get("pending").map_or(0, |g| g.count),
            confirmed: groups.get("confirmed").map_or(0, |g| g.count),
            failed: groups.get("failed").map_or(0, |g| g.count),
            avg_confirmation_secs: 0.0,
        };

        let confirmed = self
            .anchors
            .find(Filter::eq("status", "confirmed"), FindOptions::default())
            .await?;
        let deltas: Vec<f64> = confirmed
            .iter()
            .filter_map(|a| {
                a.confirmed_at
                    .map(|c| (c - a.submitted_at).num_milliseconds() as f64 / 1000.0)
            })
            .collect();
        if !deltas.is_empty() {
            stats.avg_confirmation_secs = deltas.iter().sum::<f64>() / deltas.len() as f64;
        }
        Ok(stats)
    }
}

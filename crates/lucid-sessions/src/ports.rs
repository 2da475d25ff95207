//! Outbound ports of the session pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lucid_types::{AnchorStatus, SessionMetadata};

/// Result of submitting a session for anchoring. Confirmation arrives later
/// through the anchor service's own polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorSubmission {
    pub anchoring_id: String,
    pub session_id: String,
    pub transaction_id: String,
    pub status: AnchorStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Anchoring gateway the orchestrator drives during its ANCHORING stage.
///
/// Implemented by the anchor service; completion of the stage means the
/// submission succeeded, not that the anchor is confirmed.
#[async_trait]
pub trait SessionAnchoring: Send + Sync {
    async fn anchor_session(
        &self,
        session_id: &str,
        owner_address: &str,
        merkle_root: &str,
        chunk_count: u32,
        metadata: Option<SessionMetadata>,
    ) -> Result<AnchorSubmission, String>;
}

//! Session orchestrator.
//!
//! Drives one session through
//! `CHUNKING → ENCRYPTING → MERKLE_BUILDING → ANCHORING`, persisting a
//! pipeline-state record after every transition (at-least-once). Stages do
//! not retry: any failure moves the pipeline to FAILED, persists it and
//! propagates the error to the caller.
//!
//! The orchestrator is cancellable at stage boundaries. Chunk and encrypted
//! artifacts are idempotent, so re-running a canceled session under the same
//! id resumes cleanly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

use lucid_crypto::hashing::blake3_hash;
use lucid_store::Collection;
use lucid_types::{CancelToken, ChunkMetadata, Hash32, SessionMetadata};

use crate::chunker::SessionChunker;
use crate::encryptor::{EncryptedChunkRef, SessionEncryptor};
use crate::error::SessionError;
use crate::merkle::{MerkleRootInfo, MerkleTreeBuilder};
use crate::ports::SessionAnchoring;

/// Pipeline stages, in execution order. FAILED is terminal from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Initialized,
    Chunking,
    Encrypting,
    MerkleBuilding,
    Anchoring,
    Completed,
    Failed,
}

/// Persisted pipeline state, one record per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub session_id: String,
    pub stage: PipelineStage,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub chunk_count: u32,
    pub encrypted_count: u32,
    pub merkle_root: Option<String>,
    pub anchoring_id: Option<String>,
    pub error: Option<String>,
}

/// Collection the orchestrator owns.
pub const PIPELINE_STATES: &str = "pipeline_states";

/// Drives the complete session pipeline.
pub struct SessionOrchestrator<A: SessionAnchoring> {
    chunker: SessionChunker,
    encryptor: Arc<SessionEncryptor>,
    merkle: MerkleTreeBuilder,
    anchoring: Arc<A>,
    states: Collection<PipelineState>,
}

impl<A: SessionAnchoring> SessionOrchestrator<A> {
    pub fn new(
        chunker: SessionChunker,
        encryptor: Arc<SessionEncryptor>,
        merkle: MerkleTreeBuilder,
        anchoring: Arc<A>,
        states: Collection<PipelineState>,
    ) -> Self {
        Self {
            chunker,
            encryptor,
            merkle,
            anchoring,
            states,
        }
    }

    /// Creates the artifact directories of every stage.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        self.chunker.initialize().await?;
        self.encryptor.initialize().await?;
        self.merkle.initialize().await?;
        Ok(())
    }

    /// Runs the full pipeline for one session.
    pub async fn run_pipeline(
        &self,
        session_id: &str,
        owner_address: &str,
        input: mpsc::Receiver<Vec<u8>>,
        target_chunk_size: Option<usize>,
        metadata: Option<SessionMetadata>,
        cancel: CancelToken,
    ) -> Result<PipelineState, SessionError> {
        let mut state = PipelineState {
            session_id: session_id.to_string(),
            stage: PipelineStage::Initialized,
            started_at: Utc::now(),
            ended_at: None,
            chunk_count: 0,
            encrypted_count: 0,
            merkle_root: None,
            anchoring_id: None,
            error: None,
        };
        self.persist(&state).await?;

        let result = self
            .drive(&mut state, owner_address, input, target_chunk_size, metadata, cancel)
            .await;

        match result {
            Ok(()) => {
                state.stage = PipelineStage::Completed;
                state.ended_at = Some(Utc::now());
                self.persist(&state).await?;
                info!(session_id, "session pipeline completed");
                Ok(state)
            }
            // Cancellation leaves the record at the last persisted stage so
            // a re-run under the same session id resumes cleanly.
            Err(e @ SessionError::Canceled(_)) => {
                info!(session_id, "session pipeline canceled");
                Err(e)
            }
            Err(e) => {
                error!(session_id, error = %e, "session pipeline failed");
                state.stage = PipelineStage::Failed;
                state.ended_at = Some(Utc::now());
                state.error = Some(e.to_string());
                // Best effort: the original failure outranks a persist error.
                let _ = self.persist(&state).await;
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        state: &mut PipelineState,
        owner_address: &str,
        input: mpsc::Receiver<Vec<u8>>,
        target_chunk_size: Option<usize>,
        metadata: Option<SessionMetadata>,
        cancel: CancelToken,
    ) -> Result<(), SessionError> {
        let session_id = state.session_id.clone();

        // Stage 1: chunking.
        self.transition(state, PipelineStage::Chunking).await?;
        self.check_cancel(&cancel, &session_id)?;
        let chunks = self
            .chunk_stage(&session_id, input, target_chunk_size, &cancel)
            .await?;
        state.chunk_count = chunks.len() as u32;

        // Stage 2: encryption.
        self.transition(state, PipelineStage::Encrypting).await?;
        self.check_cancel(&cancel, &session_id)?;
        let encrypted = self.encrypt_stage(&session_id, &chunks, &cancel).await?;
        state.encrypted_count = encrypted.len() as u32;

        // Stage 3: merkle tree.
        self.transition(state, PipelineStage::MerkleBuilding).await?;
        self.check_cancel(&cancel, &session_id)?;
        let root = self.merkle_stage(&session_id, &encrypted).await?;
        state.merkle_root = Some(root.root_hex());

        // Stage 4: anchoring submission.
        self.transition(state, PipelineStage::Anchoring).await?;
        self.check_cancel(&cancel, &session_id)?;
        let submission = self
            .anchoring
            .anchor_session(
                &session_id,
                owner_address,
                &root.root_hex(),
                state.chunk_count,
                metadata,
            )
            .await
            .map_err(SessionError::Anchoring)?;
        state.anchoring_id = Some(submission.anchoring_id);

        Ok(())
    }

    async fn chunk_stage(
        &self,
        session_id: &str,
        input: mpsc::Receiver<Vec<u8>>,
        target_chunk_size: Option<usize>,
        cancel: &CancelToken,
    ) -> Result<Vec<ChunkMetadata>, SessionError> {
        let mut stream = self
            .chunker
            .chunk_stream(session_id.to_string(), input, target_chunk_size);
        let mut chunks = Vec::new();
        while let Some(result) = stream.recv().await {
            self.check_cancel(cancel, session_id)?;
            chunks.push(result?);
        }
        info!(session_id, count = chunks.len(), "chunking stage complete");
        Ok(chunks)
    }

    async fn encrypt_stage(
        &self,
        session_id: &str,
        chunks: &[ChunkMetadata],
        cancel: &CancelToken,
    ) -> Result<Vec<EncryptedChunkRef>, SessionError> {
        let mut encrypted = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            self.check_cancel(cancel, session_id)?;
            let plaintext = self.chunker.read_chunk(chunk).await?;
            let r = self
                .encryptor
                .encrypt_chunk(&plaintext, &chunk.chunk_id, session_id, None)
                .await?;
            encrypted.push(r);
        }
        info!(session_id, count = encrypted.len(), "encryption stage complete");
        Ok(encrypted)
    }

    async fn merkle_stage(
        &self,
        session_id: &str,
        encrypted: &[EncryptedChunkRef],
    ) -> Result<MerkleRootInfo, SessionError> {
        // Leaves are hashes of the artifact bytes (header included), read in
        // sequence order.
        let mut leaves: Vec<Hash32> = Vec::with_capacity(encrypted.len());
        for r in encrypted {
            let bytes = tokio::fs::read(&r.file_path)
                .await
                .map_err(|_| SessionError::ChunkNotFound(r.file_path.clone()))?;
            leaves.push(blake3_hash(&bytes));
        }
        let info = self.merkle.build_tree_from_leaves(leaves, session_id)?;
        self.merkle.persist_root(&info).await?;
        Ok(info)
    }

    async fn transition(
        &self,
        state: &mut PipelineState,
        stage: PipelineStage,
    ) -> Result<(), SessionError> {
        state.stage = stage;
        self.persist(state).await?;
        info!(session_id = %state.session_id, ?stage, "pipeline stage");
        Ok(())
    }

    async fn persist(&self, state: &PipelineState) -> Result<(), SessionError> {
        self.states.upsert(&state.session_id, state).await?;
        Ok(())
    }

    fn check_cancel(&self, cancel: &CancelToken, session_id: &str) -> Result<(), SessionError> {
        if cancel.is_cancelled() {
            return Err(SessionError::Canceled(session_id.to_string()));
        }
        Ok(())
    }

    /// Current pipeline state for a session, if any.
    pub async fn pipeline_status(
        &self,
        session_id: &str,
    ) -> Result<Option<PipelineState>, SessionError> {
        Ok(self.states.get(session_id).await?)
    }

    /// Removes every artifact and record belonging to a session.
    pub async fn cleanup_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.chunker.cleanup_session(session_id).await?;
        self.encryptor.cleanup_session(session_id).await?;
        self.merkle.cleanup_session(session_id).await?;
        self.states
            .delete(lucid_store::Filter::eq("session_id", session_id))
            .await?;
        info!(session_id, "session artifacts cleaned up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lucid_store::{DocumentStore, MemoryDocumentStore};
    use lucid_types::{AnchorStatus, CancelHandle};
    use std::sync::Mutex;

    use crate::config::SessionPipelineConfig;

    struct RecordingAnchor {
        calls: Mutex<Vec<(String, String, u32)>>,
    }

    #[async_trait]
    impl SessionAnchoring for RecordingAnchor {
        async fn anchor_session(
            &self,
            session_id: &str,
            _owner_address: &str,
            merkle_root: &str,
            chunk_count: u32,
            _metadata: Option<SessionMetadata>,
        ) -> Result<crate::ports::AnchorSubmission, String> {
            self.calls.lock().unwrap().push((
                session_id.to_string(),
                merkle_root.to_string(),
                chunk_count,
            ));
            Ok(crate::ports::AnchorSubmission {
                anchoring_id: "anchor-1".into(),
                session_id: session_id.to_string(),
                transaction_id: "0xtx".into(),
                status: AnchorStatus::Pending,
                submitted_at: Utc::now(),
            })
        }
    }

    fn orchestrator(name: &str) -> SessionOrchestrator<RecordingAnchor> {
        let base = std::env::temp_dir().join(format!("lucid-orch-{name}-{}", std::process::id()));
        let config = SessionPipelineConfig::under(base);
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        SessionOrchestrator::new(
            SessionChunker::new(&config),
            Arc::new(SessionEncryptor::new(&config, None)),
            MerkleTreeBuilder::new(&config),
            Arc::new(RecordingAnchor {
                calls: Mutex::new(Vec::new()),
            }),
            Collection::new(store, PIPELINE_STATES),
        )
    }

    #[tokio::test]
    async fn pipeline_runs_to_completion() {
        let orch = orchestrator("complete");
        orch.initialize().await.unwrap();

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            tx.send(vec![1u8; 4096]).await.unwrap();
            tx.send(vec![2u8; 4096]).await.unwrap();
        });

        let state = orch
            .run_pipeline(
                "sess-complete",
                "0x1111111111111111111111111111111111111111",
                rx,
                None,
                None,
                CancelToken::never(),
            )
            .await
            .unwrap();

        assert_eq!(state.stage, PipelineStage::Completed);
        assert_eq!(state.chunk_count, 1); // under one target size
        assert_eq!(state.encrypted_count, 1);
        assert!(state.merkle_root.is_some());
        assert_eq!(state.anchoring_id.as_deref(), Some("anchor-1"));

        let persisted = orch.pipeline_status("sess-complete").await.unwrap().unwrap();
        assert_eq!(persisted.stage, PipelineStage::Completed);
        assert!(persisted.ended_at.is_some());
        orch.cleanup_session("sess-complete").await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_leaves_last_persisted_stage() {
        let orch = orchestrator("cancel");
        orch.initialize().await.unwrap();

        let (handle, token) = CancelHandle::new();
        handle.cancel();

        let (tx, rx) = mpsc::channel(1);
        drop(tx); // empty stream

        let err = orch
            .run_pipeline(
                "sess-cancel",
                "0x1111111111111111111111111111111111111111",
                rx,
                None,
                None,
                token,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Canceled(_)));

        // The record stays at the last persisted stage for resumption.
        let persisted = orch.pipeline_status("sess-cancel").await.unwrap().unwrap();
        assert_eq!(persisted.stage, PipelineStage::Chunking);
        assert!(persisted.error.is_none());
    }

    #[tokio::test]
    async fn empty_stream_fails_at_merkle_build() {
        let orch = orchestrator("empty");
        orch.initialize().await.unwrap();

        let (tx, rx) = mpsc::channel(1);
        drop(tx);

        let err = orch
            .run_pipeline(
                "sess-empty",
                "0x1111111111111111111111111111111111111111",
                rx,
                None,
                None,
                CancelToken::never(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::EmptyChunkList));

        let persisted = orch.pipeline_status("sess-empty").await.unwrap().unwrap();
        assert_eq!(persisted.stage, PipelineStage::Failed);
    }
}

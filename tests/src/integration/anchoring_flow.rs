//! Happy-path anchoring: a three-chunk session runs the whole pipeline,
//! registers on the primary chain and confirms when the receipt arrives.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use lucid_anchor::AnchorService;
    use lucid_sessions::{
        MerkleTreeBuilder, PipelineStage, SessionChunker, SessionEncryptor, SessionOrchestrator,
        SessionPipelineConfig,
    };
    use lucid_store::Collection;
    use lucid_types::{AnchorStatus, CancelToken};

    use crate::helpers::{memory_store, scratch_dir, seeded_bytes, RecordingChain, OWNER};

    const SESSION_ID: &str = "sess-00000001";
    const MIB: usize = 1024 * 1024;

    #[tokio::test]
    async fn three_chunk_session_anchors_and_confirms() {
        let store = memory_store();
        let chain = Arc::new(RecordingChain::new());
        let anchor = Arc::new(AnchorService::new(
            Arc::clone(&chain),
            Arc::clone(&store),
        ));
        anchor.initialize().await.unwrap();

        let config = SessionPipelineConfig::under(scratch_dir("anchoring-flow"));
        let orchestrator = SessionOrchestrator::new(
            SessionChunker::new(&config),
            Arc::new(SessionEncryptor::new(&config, None)),
            MerkleTreeBuilder::new(&config),
            Arc::clone(&anchor),
            Collection::new(Arc::clone(&store), lucid_sessions::orchestrator::PIPELINE_STATES),
        );
        orchestrator.initialize().await.unwrap();

        // 8 MiB + 8 MiB + 3 MiB of deterministic bytes → three chunks.
        let data = seeded_bytes(1, 19 * MIB);
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for window in data.chunks(MIB) {
                if tx.send(window.to_vec()).await.is_err() {
                    return;
                }
            }
        });

        let state = orchestrator
            .run_pipeline(SESSION_ID, OWNER, rx, Some(8 * MIB), None, CancelToken::never())
            .await
            .unwrap();

        assert_eq!(state.stage, PipelineStage::Completed);
        assert_eq!(state.chunk_count, 3);
        let merkle_root = state.merkle_root.clone().unwrap();

        // Three leaves fold in two levels.
        let builder = MerkleTreeBuilder::new(&config);
        let persisted_root = builder.load_root(SESSION_ID).await.unwrap().unwrap();
        assert_eq!(persisted_root.tree_depth, 2);
        assert_eq!(persisted_root.leaf_count, 3);
        assert_eq!(persisted_root.root_hex(), merkle_root);

        // registerSession carried exactly the six expected arguments.
        let registrations = chain.registrations.lock().unwrap();
        assert_eq!(registrations.len(), 1);
        let reg = &registrations[0];
        assert_eq!(reg.session_id, SESSION_ID);
        assert_eq!(reg.owner, OWNER);
        assert_eq!(reg.merkle_root, merkle_root);
        assert_eq!(reg.chunk_count, 3);
        assert!(reg.manifest_hash.starts_with("0x"));
        assert!(reg.started_at_unix > 0);
        drop(registrations);

        // Pending until the simulated receipt lands at block 12345.
        let status = anchor.get_anchoring_status(SESSION_ID).await.unwrap().unwrap();
        assert_eq!(status.status, AnchorStatus::Pending);

        chain.deliver_receipt(&status.transaction_id, 12_345);
        let status = anchor.get_anchoring_status(SESSION_ID).await.unwrap().unwrap();
        assert_eq!(status.status, AnchorStatus::Confirmed);
        assert_eq!(status.block_height, Some(12_345));
        assert!(status.confirmed_at.is_some());

        orchestrator.cleanup_session(SESSION_ID).await.unwrap();
    }
}

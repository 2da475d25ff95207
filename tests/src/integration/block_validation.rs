//! Tamper detection: mutating a transaction after hashing must break both
//! the transaction tree and the block hash.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lucid_blocks::BlockManager;

    use crate::helpers::{memory_store, signed_tx};

    #[tokio::test]
    async fn tampered_transaction_id_breaks_tree_and_hash() {
        let manager = BlockManager::new(memory_store(), None);
        manager.initialize().await.unwrap();

        // Grow the chain to height 4 so the target block sits at height 5.
        for i in 0..4 {
            let mut block = manager
                .create_block(vec![signed_tx(&format!("fill-{i}"), 0.0)], "node_001")
                .await
                .unwrap();
            block.signature = "producer_sig".into();
            assert!(manager.add_block(&block).await.unwrap());
        }

        let mut block = manager
            .create_block(
                vec![
                    signed_tx("b5-0", 0.0),
                    signed_tx("b5-1", 0.0),
                    signed_tx("b5-2", 0.0),
                    signed_tx("b5-3", 0.0),
                ],
                "node_001",
            )
            .await
            .unwrap();
        block.signature = "producer_sig".into();
        assert_eq!(block.height, 5);

        // Pre-tamper the block is sound.
        let clean = manager.validate_block(&block).await.unwrap();
        assert!(clean.valid, "{:?}", clean.errors);

        block.transactions[2].id = "tampered".into();
        let result = manager.validate_block(&block).await.unwrap();
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e == "Merkle root mismatch"));
        assert!(result.errors.iter().any(|e| e == "Block hash mismatch"));
    }

    #[tokio::test]
    async fn oversized_transaction_count_is_rejected_at_creation() {
        let manager = BlockManager::new(memory_store(), None);
        manager.initialize().await.unwrap();
        let txs: Vec<_> = (0..1001).map(|i| signed_tx(&format!("t{i}"), 0.0)).collect();
        assert!(manager.create_block(txs, "node_001").await.is_err());
    }

    #[tokio::test]
    async fn block_disk_mirror_uses_padded_heights() {
        let dir = crate::helpers::scratch_dir("block-mirror");
        let manager = BlockManager::new(memory_store(), Some(dir.clone()));
        manager.initialize().await.unwrap();

        let mut block = manager
            .create_block(vec![signed_tx("mirrored", 0.0)], "node_001")
            .await
            .unwrap();
        block.signature = "producer_sig".into();
        manager.add_block(&block).await.unwrap();

        assert!(dir.join("block_0000000000.json").is_file());
        assert!(dir.join("block_0000000001.json").is_file());
        let _ = std::fs::remove_dir_all(dir);
    }
}

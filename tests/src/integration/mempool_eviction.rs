//! Mempool admission under capacity pressure.

#[cfg(test)]
mod tests {
    use lucid_mempool::TransactionProcessor;
    use lucid_store::Filter;

    use crate::helpers::{memory_store, signed_tx};

    #[tokio::test]
    async fn eviction_under_load() {
        let store = memory_store();
        let processor =
            TransactionProcessor::with_capacity(std::sync::Arc::clone(&store), 3);
        processor.initialize().await.unwrap();

        processor.submit_transaction(signed_tx("A", 0.005)).await.unwrap();
        processor.submit_transaction(signed_tx("B", 0.003)).await.unwrap();
        processor.submit_transaction(signed_tx("C", 0.010)).await.unwrap();
        processor.submit_transaction(signed_tx("D", 0.004)).await.unwrap();

        // The survivors are A, C and D; B had the lowest fee.
        let resident: Vec<String> = processor
            .pending_for_block(10)
            .into_iter()
            .map(|tx| tx.id)
            .collect();
        assert_eq!(resident.len(), 3);
        assert!(resident.contains(&"A".to_string()));
        assert!(resident.contains(&"C".to_string()));
        assert!(resident.contains(&"D".to_string()));

        // B is persisted in the mempool collection with eviction recorded.
        let evicted = store.get("mempool", "B").await.unwrap().unwrap();
        assert_eq!(evicted["status"], "evicted");
        assert!(evicted.get("removed_at").is_some());

        // And the batch ordering is fee-descending.
        assert_eq!(resident[0], "C");
        assert_eq!(resident[1], "A");
        assert_eq!(resident[2], "D");
    }

    #[tokio::test]
    async fn no_transaction_is_both_pooled_and_confirmed() {
        let store = memory_store();
        let processor = TransactionProcessor::new(std::sync::Arc::clone(&store));
        processor.initialize().await.unwrap();

        let tx = signed_tx("promoted", 0.0);
        processor.submit_transaction(tx.clone()).await.unwrap();
        processor.on_block_committed(&[tx], 3).await.unwrap();

        let pooled_pending = store
            .count(
                "mempool",
                Filter::And(vec![
                    Filter::eq("id", "promoted"),
                    Filter::eq("status", "pending"),
                ]),
            )
            .await
            .unwrap();
        let confirmed = store
            .count(
                "transactions",
                Filter::And(vec![
                    Filter::eq("id", "promoted"),
                    Filter::eq("status", "confirmed"),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(pooled_pending, 0);
        assert_eq!(confirmed, 1);

        let status = processor.get_transaction_status("promoted").await.unwrap();
        assert_eq!(status.status, "confirmed");
        assert_eq!(status.block_height, Some(3));
    }
}

//! Transaction processor.
//!
//! Owns the `mempool` collection and the in-memory pool; admission,
//! eviction, expiry, leader batches and the post-inclusion move into the
//! confirmed `transactions` collection.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use lucid_store::{DocumentStore, Filter, FindOptions, IndexSpec, SortOrder};
use lucid_types::{Transaction, TransactionStatus};

use crate::error::MempoolError;
use crate::pool::{TransactionPool, MEMPOOL_MAX_SIZE};
use crate::validation::{validate_stateless, TxValidation};

const MEMPOOL: &str = "mempool";
const TRANSACTIONS: &str = "transactions";

/// Mempool summary for operators and the REST shell.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MempoolInfo {
    pub size: usize,
    pub max_size: usize,
    pub total_value: u64,
    pub average_fee: f64,
    pub oldest_transaction: Option<DateTime<Utc>>,
    pub newest_transaction: Option<DateTime<Utc>>,
}

/// Status of one transaction as seen by clients.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransactionStatusInfo {
    pub status: String,
    pub block_height: Option<u64>,
    pub confirmations: Option<u64>,
}

/// Validates, pools and batches transactions.
pub struct TransactionProcessor {
    store: Arc<dyn DocumentStore>,
    pool: Mutex<TransactionPool>,
}

impl TransactionProcessor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_capacity(store, MEMPOOL_MAX_SIZE)
    }

    pub fn with_capacity(store: Arc<dyn DocumentStore>, capacity: usize) -> Self {
        Self {
            store,
            pool: Mutex::new(TransactionPool::new(capacity)),
        }
    }

    /// Declares indexes and reloads pending transactions from the store.
    pub async fn initialize(&self) -> Result<(), MempoolError> {
        let s = &self.store;
        s.ensure_index(TRANSACTIONS, IndexSpec::unique(&["id"])).await?;
        s.ensure_index(TRANSACTIONS, IndexSpec::plain(&["from_address"])).await?;
        s.ensure_index(TRANSACTIONS, IndexSpec::plain(&["to_address"])).await?;
        s.ensure_index(TRANSACTIONS, IndexSpec::plain(&["timestamp"])).await?;
        s.ensure_index(TRANSACTIONS, IndexSpec::plain(&["status"])).await?;
        s.ensure_index(TRANSACTIONS, IndexSpec::plain(&["block_height"])).await?;

        s.ensure_index(MEMPOOL, IndexSpec::unique(&["id"])).await?;
        s.ensure_index(MEMPOOL, IndexSpec::plain(&["from_address"])).await?;
        s.ensure_index(MEMPOOL, IndexSpec::plain(&["timestamp"])).await?;
        s.ensure_index(MEMPOOL, IndexSpec::plain(&["status"])).await?;
        s.ensure_index(MEMPOOL, IndexSpec::plain(&["fee"])).await?;

        let pending = s
            .find(MEMPOOL, Filter::eq("status", "pending"), FindOptions::default())
            .await?;
        let mut pool = self.pool.lock().expect("pool lock");
        for doc in pending {
            if let Ok(tx) = serde_json::from_value::<Transaction>(strip(doc)) {
                pool.insert(tx);
            }
        }
        info!(loaded = pool.len(), "mempool reloaded from store");
        Ok(())
    }

    /// Confirmed balance of an address: received minus sent over the
    /// confirmed transactions collection.
    pub async fn address_balance(&self, address: &str) -> Result<f64, MempoolError> {
        let confirmed = Filter::eq("status", "confirmed");
        let received = self
            .store
            .sum(
                TRANSACTIONS,
                Filter::And(vec![confirmed.clone(), Filter::eq("to_address", address)]),
                "value",
            )
            .await?;
        let sent = self
            .store
            .sum(
                TRANSACTIONS,
                Filter::And(vec![confirmed, Filter::eq("from_address", address)]),
                "value",
            )
            .await?;
        Ok(received - sent)
    }

    /// Full admission validation: stateless rules plus replay and balance.
    pub async fn validate_transaction(&self, tx: &Transaction) -> Result<TxValidation, MempoolError> {
        let mut validation = validate_stateless(tx);

        // Replay: known anywhere (pool, mempool collection or chain).
        if self.transaction_exists(&tx.id).await? {
            validation.result.push_error("Duplicate transaction ID");
        }

        if tx.value > 0 {
            let balance = self.address_balance(&tx.from_address).await?;
            if balance < tx.value as f64 + validation.fee_required {
                validation.result.push_error("Insufficient balance");
            }
        }

        Ok(validation)
    }

    async fn transaction_exists(&self, id: &str) -> Result<bool, MempoolError> {
        if self.pool.lock().expect("pool lock").contains(id) {
            return Ok(true);
        }
        if self.store.get(TRANSACTIONS, id).await?.is_some() {
            return Ok(true);
        }
        Ok(self.store.get(MEMPOOL, id).await?.is_some())
    }

    /// Validates and admits a transaction, evicting the lowest-fee resident
    /// when the pool is full.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<TxValidation, MempoolError> {
        let validation = self.validate_transaction(&tx).await?;
        if !validation.result.valid {
            if validation
                .result
                .errors
                .iter()
                .any(|e| e.contains("Duplicate transaction"))
            {
                return Err(MempoolError::DuplicateTransaction(tx.id));
            }
            return Err(MempoolError::Rejected {
                errors: validation.result.errors,
            });
        }

        // Decide eviction and admit under one lock; store mirroring follows.
        let evicted_id = {
            let mut pool = self.pool.lock().expect("pool lock");
            if pool.contains(&tx.id) {
                return Err(MempoolError::DuplicateTransaction(tx.id));
            }
            let evicted = if pool.is_full() {
                let id = pool.lowest_fee_id();
                if let Some(id) = &id {
                    pool.remove(id);
                }
                id
            } else {
                None
            };
            pool.insert(tx.clone());
            evicted
        };

        if let Some(id) = evicted_id {
            self.mark_removed(&id, TransactionStatus::Evicted).await?;
            info!(evicted = %id, "evicted lowest-fee transaction");
        }

        let mut doc = serde_json::to_value(&tx)?;
        doc["_id"] = json!(tx.id);
        doc["status"] = json!(TransactionStatus::Pending.as_str());
        doc["added_to_mempool"] = json!(Utc::now());
        self.store.insert(MEMPOOL, doc).await?;

        debug!(id = %tx.id, "transaction admitted to mempool");
        Ok(validation)
    }

    /// Validates and submits a batch, returning one outcome per input.
    pub async fn submit_batch(
        &self,
        transactions: Vec<Transaction>,
    ) -> Vec<Result<TxValidation, MempoolError>> {
        let mut results = Vec::with_capacity(transactions.len());
        for tx in transactions {
            results.push(self.submit_transaction(tx).await);
        }
        results
    }

    async fn mark_removed(
        &self,
        id: &str,
        status: TransactionStatus,
    ) -> Result<(), MempoolError> {
        self.store
            .update(
                MEMPOOL,
                Filter::eq("id", id),
                json!({"status": status.as_str(), "removed_at": Utc::now()}),
            )
            .await?;
        Ok(())
    }

    /// Ordered batch for a block producer: highest fee first, then oldest.
    pub fn pending_for_block(&self, limit: usize) -> Vec<Transaction> {
        self.pool.lock().expect("pool lock").ordered_for_block(limit)
    }

    /// Moves included transactions out of the pool into the confirmed
    /// collection.
    pub async fn on_block_committed(
        &self,
        transactions: &[Transaction],
        block_height: u64,
    ) -> Result<(), MempoolError> {
        for tx in transactions {
            self.pool.lock().expect("pool lock").remove(&tx.id);
            self.mark_removed(&tx.id, TransactionStatus::Confirmed).await?;

            let mut doc = serde_json::to_value(tx)?;
            doc["_id"] = json!(tx.id);
            doc["status"] = json!(TransactionStatus::Confirmed.as_str());
            doc["block_height"] = json!(block_height);
            doc["confirmed_at"] = json!(Utc::now());
            self.store.upsert(TRANSACTIONS, &tx.id, doc).await?;
        }
        info!(count = transactions.len(), block_height, "transactions confirmed");
        Ok(())
    }

    /// Removes transactions resident longer than the TTL. Returns how many
    /// were expired.
    pub async fn expire_stale(&self) -> Result<u64, MempoolError> {
        let expired = {
            let pool = self.pool.lock().expect("pool lock");
            pool.expired_ids(Utc::now())
        };
        for id in &expired {
            self.pool.lock().expect("pool lock").remove(id);
            self.mark_removed(id, TransactionStatus::Expired).await?;
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired stale transactions");
        }
        Ok(expired.len() as u64)
    }

    /// Re-validates resident transactions and drops the now-invalid ones
    /// (stale timestamps, spent balances).
    pub async fn revalidate_pending(&self) -> Result<u64, MempoolError> {
        let resident: Vec<Transaction> = {
            let pool = self.pool.lock().expect("pool lock");
            pool.iter().cloned().collect()
        };
        let mut dropped = 0;
        for tx in resident {
            let still_in_pool = self.pool.lock().expect("pool lock").contains(&tx.id);
            if !still_in_pool {
                continue;
            }
            let mut validation = validate_stateless(&tx);
            if validation.result.valid && tx.value > 0 {
                let balance = self.address_balance(&tx.from_address).await?;
                if balance < tx.value as f64 + validation.fee_required {
                    validation.result.push_error("Insufficient balance");
                }
            }
            if !validation.result.valid {
                self.pool.lock().expect("pool lock").remove(&tx.id);
                self.mark_removed(&tx.id, TransactionStatus::Invalid).await?;
                dropped += 1;
                warn!(id = %tx.id, "dropped invalid resident transaction");
            }
        }
        Ok(dropped)
    }

    /// Client-facing status with confirmation depth.
    pub async fn get_transaction_status(
        &self,
        id: &str,
    ) -> Result<TransactionStatusInfo, MempoolError> {
        if let Some(doc) = self.store.get(TRANSACTIONS, id).await? {
            let block_height = doc["block_height"].as_u64();
            let confirmations = match block_height {
                Some(h) => Some(self.confirmations_for(h).await?),
                None => None,
            };
            return Ok(TransactionStatusInfo {
                status: doc["status"].as_str().unwrap_or("confirmed").to_string(),
                block_height,
                confirmations,
            });
        }

        if self.pool.lock().expect("pool lock").contains(id) {
            return Ok(TransactionStatusInfo {
                status: "pending".into(),
                block_height: None,
                confirmations: None,
            });
        }

        if let Some(doc) = self.store.get(MEMPOOL, id).await? {
            return Ok(TransactionStatusInfo {
                status: doc["status"].as_str().unwrap_or("unknown").to_string(),
                block_height: None,
                confirmations: None,
            });
        }

        Err(MempoolError::NotFound(id.to_string()))
    }

    async fn confirmations_for(&self, block_height: u64) -> Result<u64, MempoolError> {
        let tip = self
            .store
            .find_one(
                "blocks",
                Filter::All,
                FindOptions::sorted_by("height", SortOrder::Descending),
            )
            .await?
            .and_then(|doc| doc["height"].as_u64())
            .unwrap_or(0);
        Ok(tip.saturating_sub(block_height) + 1)
    }

    /// Transactions touching an address, most recent first.
    pub async fn transactions_by_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, MempoolError> {
        let docs = self
            .store
            .find(
                TRANSACTIONS,
                Filter::Or(vec![
                    Filter::eq("from_address", address),
                    Filter::eq("to_address", address),
                ]),
                FindOptions::sorted_by("timestamp", SortOrder::Descending).with_limit(limit),
            )
            .await?;
        docs.into_iter()
            .map(|d| serde_json::from_value(strip(d)).map_err(MempoolError::from))
            .collect()
    }

    /// Current pool summary.
    pub fn mempool_info(&self) -> MempoolInfo {
        let pool = self.pool.lock().expect("pool lock");
        let size = pool.len();
        let total_value = pool.iter().map(|tx| tx.value).sum();
        let average_fee = if size > 0 {
            pool.iter().map(|tx| tx.fee.unwrap_or(0.0)).sum::<f64>() / size as f64
        } else {
            0.0
        };
        MempoolInfo {
            size,
            max_size: pool.capacity(),
            total_value,
            average_fee,
            oldest_transaction: pool.iter().map(|tx| tx.timestamp).min(),
            newest_transaction: pool.iter().map(|tx| tx.timestamp).max(),
        }
    }
}

fn strip(mut doc: serde_json::Value) -> serde_json::Value {
    if let Some(map) = doc.as_object_mut() {
        map.remove("_id");
        map.remove("status");
        map.remove("added_to_mempool");
        map.remove("removed_at");
        map.remove("confirmed_at");
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucid_crypto::signatures::transaction_signature;
    use lucid_store::MemoryDocumentStore;

    use crate::fees::calculate_fee;

    fn signed_tx(id: &str, fee_bump: f64) -> Transaction {
        let timestamp = Utc::now();
        let from = "0x1111111111111111111111111111111111111111".to_string();
        let to = "0x2222222222222222222222222222222222222222".to_string();
        let signature = transaction_signature(id, &from, &to, 0, &[], &timestamp);
        let mut tx = Transaction {
            id: id.into(),
            from_address: from,
            to_address: to,
            value: 0,
            data: Vec::new(),
            timestamp,
            signature,
            fee: None,
            block_height: None,
        };
        // Fee is computed over the fee-less serialization, then bumped so
        // relative ordering in tests is explicit.
        tx.fee = Some(calculate_fee(&tx) + fee_bump);
        tx
    }

    async fn processor(capacity: usize) -> TransactionProcessor {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let p = TransactionProcessor::with_capacity(store, capacity);
        p.initialize().await.unwrap();
        p
    }

    #[tokio::test]
    async fn admission_and_duplicate_rejection() {
        let p = processor(100).await;
        p.submit_transaction(signed_tx("tx1", 0.0)).await.unwrap();
        let err = p.submit_transaction(signed_tx("tx1", 0.0)).await.unwrap_err();
        assert!(matches!(err, MempoolError::DuplicateTransaction(_)));
    }

    #[tokio::test]
    async fn eviction_under_load_matches_fee_order() {
        let p = processor(3).await;
        p.submit_transaction(signed_tx("a", 0.005)).await.unwrap();
        p.submit_transaction(signed_tx("b", 0.003)).await.unwrap();
        p.submit_transaction(signed_tx("c", 0.010)).await.unwrap();
        p.submit_transaction(signed_tx("d", 0.004)).await.unwrap();

        let pool = p.pool.lock().unwrap();
        assert!(pool.contains("a"));
        assert!(pool.contains("c"));
        assert!(pool.contains("d"));
        assert!(!pool.contains("b"));
        drop(pool);

        let evicted = p.store.get(MEMPOOL, "b").await.unwrap().unwrap();
        assert_eq!(evicted["status"], "evicted");
    }

    #[tokio::test]
    async fn block_batch_ordering() {
        let p = processor(100).await;
        p.submit_transaction(signed_tx("low", 0.001)).await.unwrap();
        p.submit_transaction(signed_tx("high", 0.02)).await.unwrap();
        p.submit_transaction(signed_tx("mid", 0.01)).await.unwrap();

        let batch = p.pending_for_block(2);
        let ids: Vec<_> = batch.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid"]);
    }

    #[tokio::test]
    async fn committed_transactions_leave_the_pool() {
        let p = processor(100).await;
        let tx = signed_tx("confirmed1", 0.0);
        p.submit_transaction(tx.clone()).await.unwrap();
        p.on_block_committed(&[tx.clone()], 7).await.unwrap();

        assert!(!p.pool.lock().unwrap().contains("confirmed1"));
        let status = p.get_transaction_status("confirmed1").await.unwrap();
        assert_eq!(status.status, "confirmed");
        assert_eq!(status.block_height, Some(7));

        // No transaction lives in both mempool (pending) and confirmed set.
        let mempool_doc = p.store.get(MEMPOOL, "confirmed1").await.unwrap().unwrap();
        assert_eq!(mempool_doc["status"], "confirmed");
    }

    #[tokio::test]
    async fn balance_gate_rejects_overdraft() {
        let p = processor(100).await;
        let timestamp = Utc::now();
        let from = "0x3333333333333333333333333333333333333333".to_string();
        let to = "0x2222222222222222222222222222222222222222".to_string();
        let signature = transaction_signature("spend", &from, &to, 50, &[], &timestamp);
        let mut tx = Transaction {
            id: "spend".into(),
            from_address: from,
            to_address: to,
            value: 50,
            data: Vec::new(),
            timestamp,
            signature,
            fee: None,
            block_height: None,
        };
        tx.fee = Some(calculate_fee(&tx) + 0.01);

        let err = p.submit_transaction(tx).await.unwrap_err();
        match err {
            MempoolError::Rejected { errors } => {
                assert!(errors.iter().any(|e| e.contains("Insufficient balance")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn mempool_info_reports_shape() {
        let p = processor(100).await;
        p.submit_transaction(signed_tx("i1", 0.0)).await.unwrap();
        p.submit_transaction(signed_tx("i2", 0.0)).await.unwrap();
        let info = p.mempool_info();
        assert_eq!(info.size, 2);
        assert_eq!(info.max_size, 100);
        assert!(info.average_fee > 0.0);
        assert!(info.oldest_transaction.is_some());
    }
}

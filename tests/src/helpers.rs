//! Shared test fixtures.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use lucid_crypto::signatures::transaction_signature;
use lucid_mempool::calculate_fee;
use lucid_onchain::{
    ChainClientError, ChunkCommitment, OnChainClient, SessionRegistration, TxOutcome, TxStatus,
};
use lucid_store::{DocumentStore, MemoryDocumentStore};
use lucid_types::Transaction;

pub const OWNER: &str = "0x1111111111111111111111111111111111111111";
pub const COUNTERPARTY: &str = "0x2222222222222222222222222222222222222222";

/// Fresh in-memory store.
pub fn memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryDocumentStore::new())
}

/// Unique scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("lucid-tests-{name}-{}", std::process::id()))
}

/// Deterministic random bytes.
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// A transaction with a valid signature and a fee above the floor by
/// `fee_bump`.
pub fn signed_tx(id: &str, fee_bump: f64) -> Transaction {
    let timestamp = Utc::now();
    let signature = transaction_signature(id, OWNER, COUNTERPARTY, 0, &[], &timestamp);
    let mut tx = Transaction {
        id: id.into(),
        from_address: OWNER.into(),
        to_address: COUNTERPARTY.into(),
        value: 0,
        data: Vec::new(),
        timestamp,
        signature,
        fee: None,
        block_height: None,
    };
    tx.fee = Some(calculate_fee(&tx) + fee_bump);
    tx
}

/// Scripted primary-chain client: records registrations, hands out receipts
/// placed by the test.
pub struct RecordingChain {
    pub registrations: Mutex<Vec<SessionRegistration>>,
    pub receipts: Mutex<HashMap<String, (TxStatus, Option<u64>, Option<u64>)>>,
}

impl RecordingChain {
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
            receipts: Mutex::new(HashMap::new()),
        }
    }

    pub fn deliver_receipt(&self, txid: &str, block_number: u64) {
        self.receipts.lock().unwrap().insert(
            txid.to_string(),
            (TxStatus::Success, Some(block_number), Some(21_000)),
        );
    }
}

impl Default for RecordingChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OnChainClient for RecordingChain {
    async fn register_session(
        &self,
        registration: &SessionRegistration,
    ) -> Result<TxOutcome, ChainClientError> {
        let mut registrations = self.registrations.lock().unwrap();
        registrations.push(registration.clone());
        Ok(TxOutcome {
            txid: format!("0xreg{:04}", registrations.len()),
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
            txid: "0xchunkmeta".into(),
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

//! In-memory transaction pool.
//!
//! Map by id plus a per-sender index. Capacity overflow evicts the
//! transaction with the strictly lowest fee, ties broken by earliest
//! timestamp. Persistence mirroring happens in the processor; this
//! structure is pure bookkeeping.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use lucid_types::Transaction;

/// Default pool capacity.
pub const MEMPOOL_MAX_SIZE: usize = 10_000;

/// Resident transactions older than this are expired.
pub const TRANSACTION_TTL_HOURS: i64 = 24;

#[derive(Debug)]
pub struct TransactionPool {
    capacity: usize,
    by_id: HashMap<String, Transaction>,
    by_sender: HashMap<String, Vec<String>>,
}

impl TransactionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            by_id: HashMap::new(),
            by_sender: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.by_id.get(id)
    }

    pub fn is_full(&self) -> bool {
        self.by_id.len() >= self.capacity
    }

    pub fn insert(&mut self, tx: Transaction) {
        self.by_sender
            .entry(tx.from_address.clone())
            .or_default()
            .push(tx.id.clone());
        self.by_id.insert(tx.id.clone(), tx);
    }

    pub fn remove(&mut self, id: &str) -> Option<Transaction> {
        let tx = self.by_id.remove(id)?;
        if let Some(ids) = self.by_sender.get_mut(&tx.from_address) {
            ids.retain(|i| i != id);
            if ids.is_empty() {
                self.by_sender.remove(&tx.from_address);
            }
        }
        Some(tx)
    }

    /// Id of the transaction with the lowest fee; ties go to the earliest
    /// timestamp.
    pub fn lowest_fee_id(&self) -> Option<String> {
        self.by_id
            .values()
            .min_by(|a, b| {
                let fa = a.fee.unwrap_or(0.0);
                let fb = b.fee.unwrap_or(0.0);
                fa.partial_cmp(&fb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.timestamp.cmp(&b.timestamp))
            })
            .map(|tx| tx.id.clone())
    }

    /// Ids of transactions resident longer than the TTL.
    pub fn expired_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - Duration::hours(TRANSACTION_TTL_HOURS);
        self.by_id
            .values()
            .filter(|tx| tx.timestamp < cutoff)
            .map(|tx| tx.id.clone())
            .collect()
    }

    /// Transactions ordered for block inclusion: highest fee first, then
    /// oldest first.
    pub fn ordered_for_block(&self, limit: usize) -> Vec<Transaction> {
        let mut txs: Vec<&Transaction> = self.by_id.values().collect();
        txs.sort_by(|a, b| {
            let fa = a.fee.unwrap_or(0.0);
            let fb = b.fee.unwrap_or(0.0);
            fb.partial_cmp(&fa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        txs.into_iter().take(limit).cloned().collect()
    }

    pub fn sender_ids(&self, address: &str) -> &[String] {
        self.by_sender
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.by_id.values()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_sender.clear();
    }
}

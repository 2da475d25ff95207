//! Stateless block validation checks.
//!
//! Everything here is a pure function of the block (plus the previous
//! block's hash, supplied by the manager). Admission-level transaction
//! checks that need store context (fees, balances, replay) belong to the
//! mempool; block context verifies structure only, which also keeps the
//! genesis block (whose signature is a literal) valid.

use chrono::{Duration, Utc};

use lucid_types::{is_hex_address, Block, Transaction, ValidationResult};

use crate::hashing::{compute_block_hash, compute_transaction_merkle_root, ZERO_HASH};

/// Maximum serialized block size: 1 MiB.
pub const BLOCK_SIZE_LIMIT_BYTES: usize = 1024 * 1024;

/// Maximum transactions per block.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 1000;

/// Allowed forward clock skew for block timestamps.
pub const MAX_TIMESTAMP_SKEW_MINUTES: i64 = 5;

/// Structural validation of one transaction in block context.
pub fn validate_transaction_structure(tx: &Transaction) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if tx.id.is_empty() {
        result.push_error("Transaction ID is missing");
    }
    if tx.signature.is_empty() {
        result.push_error("Transaction signature is missing");
    }
    if tx.from_address.is_empty() || tx.to_address.is_empty() {
        result.push_error("Transaction addresses are missing");
    } else {
        if !is_hex_address(&tx.from_address) {
            result.push_error("Invalid from_address format");
        }
        if !is_hex_address(&tx.to_address) {
            result.push_error("Invalid to_address format");
        }
    }

    result
}

/// Validates a block against its claimed previous hash.
///
/// `previous` is `Some(hash_of_block_at_height_minus_one)` when the manager
/// found one, `None` when it did not. Checks run in a fixed order and all
/// failures accumulate.
pub fn validate_block(block: &Block, previous: Option<&str>) -> ValidationResult {
    let mut result = ValidationResult::ok();

    // 1. Required fields.
    if block.hash.is_empty() {
        result.push_error("Block hash is missing");
    }
    if block.signature.is_empty() {
        result.push_error("Block signature is missing");
    }

    // 2-3. Chain linkage.
    if block.height == 0 {
        if block.previous_hash != ZERO_HASH {
            result.push_error("Genesis block must have zero previous hash");
        }
    } else {
        match previous {
            None => result.push_error(format!(
                "Previous block not found for height {}",
                block.height - 1
            )),
            Some(prev_hash) if prev_hash != block.previous_hash => {
                result.push_error("Previous hash mismatch");
            }
            Some(_) => {}
        }
    }

    // 4. Transaction count.
    if block.transactions.len() > MAX_TRANSACTIONS_PER_BLOCK {
        result.push_error(format!(
            "Too many transactions: {}",
            block.transactions.len()
        ));
    }

    // 5. Per-transaction structure.
    for (i, tx) in block.transactions.iter().enumerate() {
        let tx_result = validate_transaction_structure(tx);
        for error in tx_result.errors {
            result.push_error(format!("Transaction {i}: {error}"));
        }
    }

    // 6. Merkle root.
    if compute_transaction_merkle_root(&block.transactions) != block.merkle_root {
        result.push_error("Merkle root mismatch");
    }

    // 7. Block hash.
    let recomputed = compute_block_hash(
        block.height,
        &block.previous_hash,
        &block.timestamp,
        &block.merkle_root,
        &block.producer,
        block.transactions.len(),
    );
    if recomputed != block.hash {
        result.push_error("Block hash mismatch");
    }

    // 8. Clock skew.
    if block.timestamp > Utc::now() + Duration::minutes(MAX_TIMESTAMP_SKEW_MINUTES) {
        result.push_error("Block timestamp too far in future");
    }

    // 9. Serialized size.
    match serde_json::to_vec(block) {
        Ok(bytes) if bytes.len() > BLOCK_SIZE_LIMIT_BYTES => {
            result.push_error(format!("Block too large: {} bytes", bytes.len()));
        }
        Ok(_) => {}
        Err(e) => result.push_error(format!("Block serialization failed: {e}")),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lucid_types::ZERO_ADDRESS;

    fn tx(id: &str) -> Transaction {
        Transaction {
            id: id.into(),
            from_address: ZERO_ADDRESS.into(),
            to_address: ZERO_ADDRESS.into(),
            value: 0,
            data: Vec::new(),
            timestamp: Utc::now(),
            signature: "sig".into(),
            fee: None,
            block_height: None,
        }
    }

    fn valid_block(height: u64, previous_hash: &str, txs: Vec<Transaction>) -> Block {
        let timestamp = Utc::now();
        let merkle_root = compute_transaction_merkle_root(&txs);
        let hash = compute_block_hash(
            height,
            previous_hash,
            &timestamp,
            &merkle_root,
            "node_001",
            txs.len(),
        );
        Block {
            height,
            previous_hash: previous_hash.into(),
            timestamp,
            transactions: txs,
            merkle_root,
            producer: "node_001".into(),
            hash,
            signature: "producer_sig".into(),
        }
    }

    #[test]
    fn well_formed_block_passes() {
        let block = valid_block(0, ZERO_HASH, vec![tx("g")]);
        let result = validate_block(&block, None);
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn genesis_with_nonzero_previous_fails() {
        let block = valid_block(0, &"ab".repeat(32), vec![]);
        let result = validate_block(&block, None);
        assert!(result.errors.iter().any(|e| e.contains("zero previous hash")));
    }

    #[test]
    fn missing_previous_block_is_an_error() {
        let block = valid_block(5, &"ab".repeat(32), vec![]);
        let result = validate_block(&block, None);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("Previous block not found")));
    }

    #[test]
    fn tampered_transaction_breaks_tree_and_hash() {
        let mut block = valid_block(5, &"ab".repeat(32), vec![tx("a"), tx("b"), tx("c"), tx("d")]);
        block.transactions[2].id = "mutated".into();
        let result = validate_block(&block, Some(&"ab".repeat(32)));
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e == "Merkle root mismatch"));
        assert!(result.errors.iter().any(|e| e == "Block hash mismatch"));
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let mut block = valid_block(0, ZERO_HASH, vec![]);
        block.timestamp = Utc::now() + Duration::minutes(10);
        // Rehash so only the skew check trips.
        block.hash = compute_block_hash(
            block.height,
            &block.previous_hash,
            &block.timestamp,
            &block.merkle_root,
            &block.producer,
            0,
        );
        let result = validate_block(&block, None);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("timestamp too far in future")));
    }

    #[test]
    fn bad_address_is_reported_with_index() {
        let mut bad = tx("x");
        bad.from_address = "not-an-address".into();
        let block = valid_block(0, ZERO_HASH, vec![bad]);
        let result = validate_block(&block, None);
        assert!(result
            .errors
            .iter()
            .any(|e| e.starts_with("Transaction 0:") && e.contains("from_address")));
    }
}

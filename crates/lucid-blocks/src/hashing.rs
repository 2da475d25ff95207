//! Block and transaction-tree hashing.
//!
//! The block hash covers `height || previous_hash || timestamp ||
//! merkle_root || producer || transaction_count` with no delimiter:
//! height and count as decimal, hashes as 64-char lowercase hex, the
//! timestamp as UTC RFC3339 with exactly nine fractional digits and a `Z`
//! suffix. Any formatter drift changes every block hash, so the rendering
//! lives here and nowhere else.
//!
//! Transaction trees hash the transaction *id string* at the leaves; chunk
//! trees (in the session pipeline) hash encrypted bytes. The two schemes are
//! intentionally distinct.

use chrono::{DateTime, SecondsFormat, Utc};

use lucid_crypto::hashing::blake3_hash;
use lucid_types::Transaction;

/// All-zero 64-char hex, the previous-hash of genesis and the root of an
/// empty transaction set.
pub const ZERO_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Renders the timestamp exactly as it is hashed.
pub fn hashed_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Computes the hex BLAKE3 block hash over the serialized header fields.
pub fn compute_block_hash(
    height: u64,
    previous_hash: &str,
    timestamp: &DateTime<Utc>,
    merkle_root: &str,
    producer: &str,
    transaction_count: usize,
) -> String {
    let payload = format!(
        "{height}{previous_hash}{}{merkle_root}{producer}{transaction_count}",
        hashed_timestamp(timestamp)
    );
    hex::encode(blake3_hash(payload.as_bytes()))
}

/// Computes the hex BLAKE3 Merkle root over transaction ids with last-node
/// duplication. Empty input yields the zero hash.
pub fn compute_transaction_merkle_root(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return ZERO_HASH.to_string();
    }

    let mut level: Vec<[u8; 32]> = transactions
        .iter()
        .map(|tx| blake3_hash(tx.id.as_bytes()))
        .collect();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let (left, right) = match pair {
                    [l, r] => (l, r),
                    [odd] => (odd, odd),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                };
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(left);
                buf[32..].copy_from_slice(right);
                blake3_hash(&buf)
            })
            .collect();
    }

    hex::encode(level[0])
}

//! Field-pure signature scheme.
//!
//! Transactions and task proofs carry a keyed BLAKE3 digest of their fields
//! rather than an asymmetric signature. Verification is a deterministic
//! function of the signed fields and nothing else, which is the property the
//! validation layers rely on. Swapping in Ed25519 later only requires
//! replacing these two functions while preserving that purity.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::hashing::blake3_hex;

/// Canonical timestamp rendering used inside signing payloads.
///
/// Microsecond precision with a `Z` suffix; both signer and verifier must
/// render through this function.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Computes the expected signature for a chain transaction.
///
/// `BLAKE3(from ":" BLAKE3(id from to value data timestamp))`, all hex.
pub fn transaction_signature(
    id: &str,
    from_address: &str,
    to_address: &str,
    value: u64,
    data: &[u8],
    timestamp: &DateTime<Utc>,
) -> String {
    let payload = format!(
        "{id}{from_address}{to_address}{value}{}{}",
        hex::encode(data),
        canonical_timestamp(timestamp)
    );
    let inner = blake3_hex(payload.as_bytes());
    blake3_hex(format!("{from_address}:{inner}").as_bytes())
}

/// Computes the expected signature for a PoOT task proof.
///
/// `BLAKE3(node_id ":" BLAKE3(node_id slot type value_json timestamp))`.
pub fn task_proof_signature(
    node_id: &str,
    slot: u64,
    proof_type: &str,
    value_json: &str,
    timestamp: &DateTime<Utc>,
) -> String {
    let payload = format!(
        "{node_id}{slot}{proof_type}{value_json}{}",
        canonical_timestamp(timestamp)
    );
    let inner = blake3_hex(payload.as_bytes());
    blake3_hex(format!("{node_id}:{inner}").as_bytes())
}

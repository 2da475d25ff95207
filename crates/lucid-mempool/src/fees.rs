//! Fee model.

use lucid_types::Transaction;

/// Flat fee every transaction pays.
pub const BASE_FEE: f64 = 0.001;

/// Per-byte rate for both serialized size and payload bytes.
pub const BYTE_FEE: f64 = 0.000_001;

/// Required fee: base + serialized bytes + payload bytes, each at one
/// micro-unit per byte.
///
/// The size term is taken over the fee-independent serialization (fee and
/// block-inclusion fields cleared), so setting the fee never changes the
/// fee that is required.
pub fn calculate_fee(tx: &Transaction) -> f64 {
    let mut normalized = tx.clone();
    normalized.fee = None;
    normalized.block_height = None;
    let serialized = serde_json::to_vec(&normalized).map(|b| b.len()).unwrap_or(0);
    BASE_FEE + serialized as f64 * BYTE_FEE + tx.data.len() as f64 * BYTE_FEE
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tx(data: Vec<u8>) -> Transaction {
        Transaction {
            id: "t".into(),
            from_address: "0x1111111111111111111111111111111111111111".into(),
            to_address: "0x2222222222222222222222222222222222222222".into(),
            value: 1,
            data,
            timestamp: Utc::now(),
            signature: "s".into(),
            fee: None,
            block_height: None,
        }
    }

    #[test]
    fn fee_grows_with_payload() {
        let small = calculate_fee(&tx(vec![]));
        let large = calculate_fee(&tx(vec![0u8; 10_000]));
        assert!(small >= BASE_FEE);
        assert!(large > small);
    }
}

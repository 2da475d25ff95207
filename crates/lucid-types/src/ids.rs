//! Identifier and address helpers.

use uuid::Uuid;

/// The all-zero primary-chain address used by genesis transactions.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Generates a fresh UUID-shaped session id.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a locally-assigned anchoring id.
pub fn generate_anchoring_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validates a primary-chain address: `0x` followed by exactly 40 hex chars.
pub fn is_hex_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Chunk artifact id, `<session_id>_chunk_<6-digit sequence>`.
pub fn chunk_id(session_id: &str, sequence: u32) -> String {
    format!("{session_id}_chunk_{sequence:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_address_validation() {
        assert!(is_hex_address("0x1111111111111111111111111111111111111111"));
        assert!(is_hex_address(ZERO_ADDRESS));
        assert!(!is_hex_address("0x111"));
        assert!(!is_hex_address("1111111111111111111111111111111111111111x0"));
        assert!(!is_hex_address("0xZZ11111111111111111111111111111111111111"));
    }

    #[test]
    fn chunk_ids_are_zero_padded() {
        assert_eq!(chunk_id("s", 7), "s_chunk_000007");
        assert_eq!(chunk_id("s", 123456), "s_chunk_123456");
    }
}

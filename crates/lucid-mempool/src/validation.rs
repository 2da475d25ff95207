//! Transaction admission validation.
//!
//! Stateless rules live here; the processor layers the store-backed checks
//! (replay, balance) on top.

use chrono::{Duration, Utc};

use lucid_crypto::signatures::transaction_signature;
use lucid_types::{is_hex_address, Transaction, ValidationResult};

use crate::fees::calculate_fee;

/// Maximum serialized transaction size: 1 MiB.
pub const MAX_TRANSACTION_SIZE_BYTES: usize = 1024 * 1024;

/// Oldest acceptable transaction age.
pub const MAX_TRANSACTION_AGE_HOURS: i64 = 1;

/// Allowed forward clock skew.
pub const MAX_TIMESTAMP_SKEW_MINUTES: i64 = 5;

/// Validation outcome plus the fee the transaction must carry.
#[derive(Debug, Clone)]
pub struct TxValidation {
    pub result: ValidationResult,
    pub fee_required: f64,
}

/// Stateless admission checks: structure, addresses, size, timestamp
/// window, fee floor, signature.
pub fn validate_stateless(tx: &Transaction) -> TxValidation {
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

    match serde_json::to_vec(tx) {
        Ok(bytes) if bytes.len() > MAX_TRANSACTION_SIZE_BYTES => {
            result.push_error(format!("Transaction too large: {} bytes", bytes.len()));
        }
        Ok(_) => {}
        Err(e) => result.push_error(format!("Transaction serialization failed: {e}")),
    }

    let fee_required = calculate_fee(tx);
    if tx.fee.unwrap_or(0.0) < fee_required {
        result.push_error(format!(
            "Insufficient fee: {} < {fee_required}",
            tx.fee.unwrap_or(0.0)
        ));
    }

    let now = Utc::now();
    if tx.timestamp > now + Duration::minutes(MAX_TIMESTAMP_SKEW_MINUTES) {
        result.push_error("Transaction timestamp too far in future");
    }
    if tx.timestamp < now - Duration::hours(MAX_TRANSACTION_AGE_HOURS) {
        result.push_error("Transaction timestamp too old");
    }

    let expected = transaction_signature(
        &tx.id,
        &tx.from_address,
        &tx.to_address,
        tx.value,
        &tx.data,
        &tx.timestamp,
    );
    if tx.signature != expected {
        result.push_error("Invalid transaction signature");
    }

    TxValidation {
        result,
        fee_required,
    }
}

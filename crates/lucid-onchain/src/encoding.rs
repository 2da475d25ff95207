//! ABI-shaped call-data encoding.
//!
//! Four-byte Keccak selector followed by the arguments as 32-byte words,
//! in the order the contract surface declares them:
//!
//! - `registerSession(bytes32 sessionId, bytes32 manifestHash,
//!    uint256 startedAtUnix, address owner, bytes32 merkleRoot,
//!    uint256 chunkCount)`
//! - `storeChunkMetadata(bytes32 sessionId, uint256 chunkIdx,
//!    bytes32 ciphertextHash, uint256 sizeBytes)`
//!
//! UUID-shaped session ids map to `bytes32` as the Keccak-256 of their
//! ASCII form.

use sha3::{Digest, Keccak256};

use crate::error::ChainClientError;

const REGISTER_SESSION_SIG: &str = "registerSession(bytes32,bytes32,uint256,address,bytes32,uint256)";
const STORE_CHUNK_METADATA_SIG: &str = "storeChunkMetadata(bytes32,uint256,bytes32,uint256)";
pub const SESSION_REGISTERED_SIG: &str = "SessionRegistered(bytes32,bytes32,bytes32,uint256)";

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Topic hash of the `SessionRegistered` event.
pub fn session_registered_topic() -> String {
    format!("0x{}", hex::encode(keccak256(SESSION_REGISTERED_SIG.as_bytes())))
}

/// `bytes32` form of a session id.
pub fn session_id_word(session_id: &str) -> [u8; 32] {
    keccak256(session_id.as_bytes())
}

fn word_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_from_hex32(field: &'static str, value: &str) -> Result<[u8; 32], ChainClientError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).map_err(|_| ChainClientError::InvalidField {
        field,
        value: value.to_string(),
    })?;
    if bytes.len() != 32 {
        return Err(ChainClientError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&bytes);
    Ok(word)
}

fn word_from_address(field: &'static str, value: &str) -> Result<[u8; 32], ChainClientError> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).map_err(|_| ChainClientError::InvalidField {
        field,
        value: value.to_string(),
    })?;
    if bytes.len() != 20 {
        return Err(ChainClientError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

/// Call data for `registerSession`.
pub fn encode_register_session(
    session_id: &str,
    manifest_hash: &str,
    started_at_unix: u64,
    owner: &str,
    merkle_root: &str,
    chunk_count: u64,
) -> Result<Vec<u8>, ChainClientError> {
    let mut data = Vec::with_capacity(4 + 6 * 32);
    data.extend_from_slice(&selector(REGISTER_SESSION_SIG));
    data.extend_from_slice(&session_id_word(session_id));
    data.extend_from_slice(&word_from_hex32("manifest_hash", manifest_hash)?);
    data.extend_from_slice(&word_from_u64(started_at_unix));
    data.extend_from_slice(&word_from_address("owner", owner)?);
    data.extend_from_slice(&word_from_hex32("merkle_root", merkle_root)?);
    data.extend_from_slice(&word_from_u64(chunk_count));
    Ok(data)
}

/// Call data for `storeChunkMetadata`.
pub fn encode_store_chunk_metadata(
    session_id: &str,
    chunk_idx: u64,
    ciphertext_hash: &str,
    size_bytes: u64,
) -> Result<Vec<u8>, ChainClientError> {
    let mut data = Vec::with_capacity(4 + 4 * 32);
    data.extend_from_slice(&selector(STORE_CHUNK_METADATA_SIG));
    data.extend_from_slice(&session_id_word(session_id));
    data.extend_from_slice(&word_from_u64(chunk_idx));
    data.extend_from_slice(&word_from_hex32("ciphertext_hash", ciphertext_hash)?);
    data.extend_from_slice(&word_from_u64(size_bytes));
    Ok(data)
}

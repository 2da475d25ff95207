//! Per-chunk key derivation.
//!
//! Each chunk is encrypted under a key derived from the session master key
//! and a per-chunk random salt via HKDF with BLAKE2b-512. The derivation
//! info string is `lucid-chunk-encryption:{session_id}:{chunk_id}`. Files
//! written with one master key remain readable after rotation only through
//! their embedded salt, so the info string must never change shape.

use blake2::Blake2b512;
use hkdf::SimpleHkdf;

use crate::errors::CryptoError;

/// HKDF salt length in bytes.
pub const SALT_SIZE: usize = 32;

/// Derives the 256-bit encryption key for one chunk.
pub fn derive_chunk_key(
    master_key: &[u8; 32],
    session_id: &str,
    chunk_id: &str,
    salt: &[u8; SALT_SIZE],
) -> Result<[u8; 32], CryptoError> {
    let info = format!("lucid-chunk-encryption:{session_id}:{chunk_id}");
    let hk = SimpleHkdf::<Blake2b512>::new(Some(salt), master_key);
    let mut okm = [0u8; 32];
    hk.expand(info.as_bytes(), &mut okm)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok(okm)
}

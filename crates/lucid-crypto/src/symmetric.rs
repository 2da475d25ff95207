//! # Symmetric Encryption
//!
//! XChaCha20-Poly1305 with detached tags.
//!
//! The chunk file layout stores `[salt | nonce | tag | ciphertext]` at fixed
//! offsets, so encryption returns the tag separately instead of appended.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroize;

use crate::errors::CryptoError;

/// Poly1305 tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// XChaCha20 nonce length in bytes.
pub const NONCE_SIZE: usize = 24;

/// 256-bit master key, zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// 24-byte XChaCha20 nonce.
#[derive(Clone, Copy)]
pub struct XNonce24([u8; NONCE_SIZE]);

impl XNonce24 {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a random nonce (safe with the 192-bit nonce space).
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Encrypts `plaintext` under `key`/`nonce`, returning the ciphertext and
/// the detached 16-byte tag.
pub fn encrypt_detached(
    key: &[u8; 32],
    nonce: &XNonce24,
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_SIZE]), CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let mut combined = cipher
        .encrypt(XNonce::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let split = combined.len() - TAG_SIZE;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&combined[split..]);
    combined.truncate(split);
    Ok((combined, tag))
}

/// Decrypts a detached-tag ciphertext. Fails if the tag does not verify.
pub fn decrypt_detached(
    key: &[u8; 32],
    nonce: &XNonce24,
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(XNonce::from_slice(nonce.as_bytes()), combined.as_slice())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

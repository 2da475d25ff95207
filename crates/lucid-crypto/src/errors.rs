//! Crypto error types.

use thiserror::Error;

/// Errors surfaced by the crypto primitives.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// AEAD encryption failed.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// AEAD tag verification failed; the ciphertext or its metadata was
    /// tampered with.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// HKDF expand rejected the requested output length.
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// Input of the wrong length for a fixed-size field.
    #[error("Invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

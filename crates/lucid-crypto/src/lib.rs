//! # Lucid Crypto
//!
//! Cryptographic primitives shared by the session pipeline and the chain
//! core.
//!
//! ## Components
//!
//! - **Hashing**: BLAKE3 (Merkle trees, block hashes) and SHA-256
//!   (pre-compression chunk checksums, manifest hashes)
//! - **Symmetric**: XChaCha20-Poly1305 with detached tags for the encrypted
//!   chunk file layout
//! - **KDF**: HKDF-BLAKE2b-512 per-chunk key derivation from a master key
//! - **Signatures**: field-pure placeholder scheme for transactions and task
//!   proofs (verification is a deterministic function of the signed fields)

pub mod errors;
pub mod hashing;
pub mod kdf;
pub mod signatures;
pub mod symmetric;

pub use errors::CryptoError;
pub use hashing::{blake3_hash, blake3_hex, sha256_hash, sha256_hex};
pub use kdf::derive_chunk_key;
pub use symmetric::{MasterKey, XNonce24};

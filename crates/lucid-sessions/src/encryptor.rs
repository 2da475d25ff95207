//! Session encryptor.
//!
//! Per-chunk XChaCha20-Poly1305 under keys derived from the session master
//! key with HKDF-BLAKE2b. Every encrypted artifact is self-describing:
//! `[salt(32) | nonce(24) | tag(16) | ciphertext]` at fixed offsets, so
//! decryption after a master-key rotation only needs the file and the key
//! that wrote it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tokio::task;
use tracing::{debug, info};

use lucid_crypto::kdf::{derive_chunk_key, SALT_SIZE};
use lucid_crypto::symmetric::{
    decrypt_detached, encrypt_detached, MasterKey, XNonce24, NONCE_SIZE, TAG_SIZE,
};
use lucid_crypto::CryptoError;

use crate::config::SessionPipelineConfig;
use crate::error::SessionError;

const HEADER_SIZE: usize = SALT_SIZE + NONCE_SIZE + TAG_SIZE;

/// Reference to an encrypted chunk artifact.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedChunkRef {
    pub chunk_id: String,
    pub session_id: String,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub nonce: [u8; NONCE_SIZE],
    #[serde_as(as = "serde_with::hex::Hex")]
    pub tag: [u8; TAG_SIZE],
    pub key_id: String,
    /// Ciphertext length, excluding the 72-byte header.
    pub encrypted_size: u64,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

/// Per-session encryption statistics from the artifacts on disk.
#[derive(Debug, Clone, Default)]
pub struct EncryptionStats {
    pub total_encrypted_chunks: u64,
    pub total_encrypted_size: u64,
}

/// Encrypts and decrypts session chunks.
pub struct SessionEncryptor {
    output_dir: PathBuf,
    master_key: RwLock<MasterKey>,
    /// Derived keys by `(session, chunk, salt-hex)`; cleared on rotation.
    key_cache: Mutex<HashMap<String, [u8; 32]>>,
}

impl SessionEncryptor {
    /// Builds an encryptor with the supplied master key, or a freshly
    /// generated one.
    pub fn new(config: &SessionPipelineConfig, master_key: Option<MasterKey>) -> Self {
        Self {
            output_dir: config.encrypted_dir.clone(),
            master_key: RwLock::new(master_key.unwrap_or_else(MasterKey::generate)),
            key_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the output directory. Must be called before encrypting.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    fn chunk_key(
        &self,
        session_id: &str,
        chunk_id: &str,
        salt: &[u8; SALT_SIZE],
    ) -> Result<[u8; 32], CryptoError> {
        let cache_key = format!("{session_id}:{chunk_id}:{}", hex::encode(salt));
        if let Some(key) = self.key_cache.lock().expect("key cache lock").get(&cache_key) {
            return Ok(*key);
        }
        let master = self.master_key.read().expect("master key lock").clone();
        let key = derive_chunk_key(master.as_bytes(), session_id, chunk_id, salt)?;
        self.key_cache
            .lock()
            .expect("key cache lock")
            .insert(cache_key, key);
        Ok(key)
    }

    /// Encrypts one chunk and writes its artifact.
    pub async fn encrypt_chunk(
        &self,
        data: &[u8],
        chunk_id: &str,
        session_id: &str,
        key_id: Option<String>,
    ) -> Result<EncryptedChunkRef, SessionError> {
        let key_id = key_id.unwrap_or_else(|| format!("key_{}", Utc::now().timestamp()));

        let mut salt = [0u8; SALT_SIZE];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut salt);
        let nonce = XNonce24::generate();

        let key = self.chunk_key(session_id, chunk_id, &salt)?;
        let plaintext = data.to_vec();
        let (ciphertext, tag) = task::spawn_blocking(move || {
            encrypt_detached(&key, &nonce, &plaintext)
        })
        .await
        .expect("chunk encryption task panicked")?;

        let path = self.output_dir.join(format!("{chunk_id}.enc"));
        let mut file_bytes = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        file_bytes.extend_from_slice(&salt);
        file_bytes.extend_from_slice(nonce.as_bytes());
        file_bytes.extend_from_slice(&tag);
        file_bytes.extend_from_slice(&ciphertext);
        tokio::fs::write(&path, &file_bytes).await?;

        debug!(chunk_id, plaintext = data.len(), ciphertext = ciphertext.len(), "chunk encrypted");

        Ok(EncryptedChunkRef {
            chunk_id: chunk_id.to_string(),
            session_id: session_id.to_string(),
            nonce: *nonce.as_bytes(),
            tag,
            key_id,
            encrypted_size: ciphertext.len() as u64,
            file_path: path.to_string_lossy().into_owned(),
            created_at: Utc::now(),
        })
    }

    /// Reads an artifact and decrypts it, verifying the Poly1305 tag.
    ///
    /// Salt, nonce and tag come from the file header, so artifacts written
    /// before a key rotation remain unreadable only if the master key that
    /// wrote them is gone.
    pub async fn decrypt_chunk(&self, r: &EncryptedChunkRef) -> Result<Vec<u8>, SessionError> {
        let file_bytes = tokio::fs::read(&r.file_path)
            .await
            .map_err(|_| SessionError::ChunkNotFound(r.file_path.clone()))?;

        if file_bytes.len() < HEADER_SIZE {
            return Err(SessionError::Integrity(format!(
                "encrypted artifact for {} is truncated",
                r.chunk_id
            )));
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&file_bytes[..SALT_SIZE]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&file_bytes[SALT_SIZE..SALT_SIZE + NONCE_SIZE]);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&file_bytes[SALT_SIZE + NONCE_SIZE..HEADER_SIZE]);

        let key = self.chunk_key(&r.session_id, &r.chunk_id, &salt)?;
        let chunk_id = r.chunk_id.clone();

        task::spawn_blocking(move || {
            decrypt_detached(&key, &XNonce24::from_bytes(nonce), &file_bytes[HEADER_SIZE..], &tag)
        })
        .await
        .expect("chunk decryption task panicked")
        .map_err(|e| SessionError::Integrity(format!("failed to decrypt chunk {chunk_id}: {e}")))
    }

    /// Replaces the master key and clears the derived-key cache. Returns the
    /// new key so callers can persist it in their secret store.
    pub fn rotate_master_key(&self, new_key: Option<MasterKey>) -> MasterKey {
        let next = new_key.unwrap_or_else(MasterKey::generate);
        *self.master_key.write().expect("master key lock") = next.clone();
        self.key_cache.lock().expect("key cache lock").clear();
        info!("master key rotated, derived-key cache cleared");
        next
    }

    /// Number of entries currently in the derived-key cache.
    pub fn cached_keys(&self) -> usize {
        self.key_cache.lock().expect("key cache lock").len()
    }

    /// Removes all encrypted artifacts for a session.
    pub async fn cleanup_session(&self, session_id: &str) -> Result<u64, SessionError> {
        let mut removed = 0;
        let prefix = format!("{session_id}_chunk_");
        let mut entries = tokio::fs::read_dir(&self.output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".enc") {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        info!(session_id, removed, "cleaned up encrypted artifacts");
        Ok(removed)
    }

    /// Statistics over the session's encrypted artifacts on disk.
    pub async fn encryption_stats(&self, session_id: &str) -> Result<EncryptionStats, SessionError> {
        let mut stats = EncryptionStats::default();
        let prefix = format!("{session_id}_chunk_");
        let mut entries = tokio::fs::read_dir(&self.output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".enc") {
                stats.total_encrypted_chunks += 1;
                stats.total_encrypted_size += entry.metadata().await?.len();
            }
        }
        Ok(stats)
    }
}

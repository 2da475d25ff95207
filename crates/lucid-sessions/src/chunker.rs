//! Session chunker.
//!
//! Cuts a session byte stream into 8–16 MiB chunks, compresses each with
//! Zstd level 3 and records a SHA-256 checksum taken before compression.
//! Artifacts land on disk as `<session_id>_chunk_<6-digit index>.zst`.

use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};

use lucid_crypto::hashing::sha256_hash;
use lucid_types::{chunk_id, ChunkMetadata};

use crate::config::SessionPipelineConfig;
use crate::error::SessionError;

/// Per-session chunking statistics, derived from the artifacts on disk.
#[derive(Debug, Clone, Default)]
pub struct ChunkingStats {
    pub total_chunks: u64,
    pub total_compressed_size: u64,
}

/// Splits session streams into fixed-size compressed chunks.
#[derive(Debug, Clone)]
pub struct SessionChunker {
    output_dir: PathBuf,
    compression_level: i32,
    stage_buffer: usize,
}

impl SessionChunker {
    pub fn new(config: &SessionPipelineConfig) -> Self {
        Self {
            output_dir: config.chunk_dir.clone(),
            compression_level: config.compression_level,
            stage_buffer: config.stage_buffer,
        }
    }

    /// Creates the output directory. Must be called before chunking.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// Chunks an in-memory buffer. Empty input yields zero chunks; a
    /// single-byte input yields one chunk of size 1.
    pub async fn chunk_buffer(
        &self,
        session_id: &str,
        data: &[u8],
        target_chunk_size: Option<usize>,
    ) -> Result<Vec<ChunkMetadata>, SessionError> {
        let target = SessionPipelineConfig::clamp_target(
            target_chunk_size.unwrap_or(crate::config::CHUNK_SIZE_MIN),
        );
        info!(session_id, target, bytes = data.len(), "starting chunking");

        let mut chunks = Vec::new();
        for (sequence, window) in data.chunks(target).enumerate() {
            let meta = self
                .process_chunk(session_id, sequence as u32, window.to_vec())
                .await?;
            debug!(
                session_id,
                sequence,
                original = meta.original_size,
                compressed = meta.compressed_size,
                "chunk written"
            );
            chunks.push(meta);
        }

        info!(session_id, count = chunks.len(), "chunking complete");
        Ok(chunks)
    }

    /// Streaming chunker: consumes the session byte stream from a bounded
    /// channel and emits chunk metadata as each chunk completes. The final
    /// partial buffer becomes the last chunk.
    pub fn chunk_stream(
        &self,
        session_id: String,
        mut input: mpsc::Receiver<Vec<u8>>,
        target_chunk_size: Option<usize>,
    ) -> mpsc::Receiver<Result<ChunkMetadata, SessionError>> {
        let target = SessionPipelineConfig::clamp_target(
            target_chunk_size.unwrap_or(crate::config::CHUNK_SIZE_MIN),
        );
        let (tx, rx) = mpsc::channel(self.stage_buffer.max(1));
        let chunker = self.clone();

        tokio::spawn(async move {
            let mut pending: Vec<u8> = Vec::new();
            let mut sequence: u32 = 0;

            while let Some(bytes) = input.recv().await {
                pending.extend_from_slice(&bytes);
                while pending.len() >= target {
                    let chunk_data: Vec<u8> = pending.drain(..target).collect();
                    let result = chunker
                        .process_chunk(&session_id, sequence, chunk_data)
                        .await;
                    let failed = result.is_err();
                    if tx.send(result).await.is_err() || failed {
                        return;
                    }
                    sequence += 1;
                }
            }

            if !pending.is_empty() {
                let result = chunker
                    .process_chunk(&session_id, sequence, std::mem::take(&mut pending))
                    .await;
                let _ = tx.send(result).await;
            }
        });

        rx
    }

    async fn process_chunk(
        &self,
        session_id: &str,
        sequence: u32,
        data: Vec<u8>,
    ) -> Result<ChunkMetadata, SessionError> {
        let id = chunk_id(session_id, sequence);
        let level = self.compression_level;
        let original_size = data.len() as u64;

        let (checksum, compressed) = task::spawn_blocking(move || {
            let checksum = sha256_hash(&data);
            zstd::encode_all(data.as_slice(), level).map(|compressed| (checksum, compressed))
        })
        .await
        .expect("chunk compression task panicked")?;

        let compressed_size = compressed.len() as u64;
        let path = self.output_dir.join(format!("{id}.zst"));
        tokio::fs::write(&path, &compressed).await?;

        Ok(ChunkMetadata {
            chunk_id: id,
            session_id: session_id.to_string(),
            sequence,
            original_size,
            compressed_size,
            encrypted_size: None,
            compression_ratio: if original_size > 0 {
                compressed_size as f64 / original_size as f64
            } else {
                0.0
            },
            plaintext_sha256: checksum,
            ciphertext_blake3: None,
            file_path: path.to_string_lossy().into_owned(),
            created_at: Utc::now(),
        })
    }

    /// Reads a chunk back, decompresses it and re-verifies its checksum.
    pub async fn read_chunk(&self, meta: &ChunkMetadata) -> Result<Vec<u8>, SessionError> {
        let compressed = tokio::fs::read(&meta.file_path)
            .await
            .map_err(|_| SessionError::ChunkNotFound(meta.file_path.clone()))?;

        let data = task::spawn_blocking(move || zstd::decode_all(compressed.as_slice()))
            .await
            .expect("chunk decompression task panicked")?;

        let checksum = sha256_hash(&data);
        if checksum != meta.plaintext_sha256 {
            return Err(SessionError::Integrity(format!(
                "checksum mismatch for chunk {}",
                meta.chunk_id
            )));
        }
        Ok(data)
    }

    /// Removes all chunk artifacts for a session, returning how many were
    /// deleted.
    pub async fn cleanup_session(&self, session_id: &str) -> Result<u64, SessionError> {
        let mut removed = 0;
        let prefix = format!("{session_id}_chunk_");
        let mut entries = tokio::fs::read_dir(&self.output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".zst") {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(file = %name, error = %e, "failed to remove chunk artifact"),
                }
            }
        }
        info!(session_id, removed, "cleaned up chunk artifacts");
        Ok(removed)
    }

    /// Statistics over the session's artifacts currently on disk.
    pub async fn chunking_stats(&self, session_id: &str) -> Result<ChunkingStats, SessionError> {
        let mut stats = ChunkingStats::default();
        let prefix = format!("{session_id}_chunk_");
        let mut entries = tokio::fs::read_dir(&self.output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".zst") {
                stats.total_chunks += 1;
                stats.total_compressed_size += entry.metadata().await?.len();
            }
        }
        Ok(stats)
    }
}

//! Pipeline configuration.
//!
//! Plain value, injected at construction. Nothing here touches the
//! filesystem or the environment; directory creation happens in each
//! component's `initialize()`.

use std::path::{Path, PathBuf};

/// Lower chunk-size bound: 8 MiB.
pub const CHUNK_SIZE_MIN: usize = 8 * 1024 * 1024;

/// Upper chunk-size bound: 16 MiB.
pub const CHUNK_SIZE_MAX: usize = 16 * 1024 * 1024;

/// Zstd compression level for chunk artifacts.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Configuration for the session pipeline components.
#[derive(Debug, Clone)]
pub struct SessionPipelineConfig {
    /// Directory for compressed chunk artifacts.
    pub chunk_dir: PathBuf,
    /// Directory for encrypted chunk artifacts.
    pub encrypted_dir: PathBuf,
    /// Directory for persisted Merkle root metadata.
    pub merkle_dir: PathBuf,
    /// Target chunk size, clamped into `[CHUNK_SIZE_MIN, CHUNK_SIZE_MAX]`.
    pub target_chunk_size: usize,
    /// Zstd level used when writing chunk artifacts.
    pub compression_level: i32,
    /// Capacity of the bounded channels between pipeline stages; overflow
    /// blocks the upstream producer.
    pub stage_buffer: usize,
}

impl SessionPipelineConfig {
    /// Derives the standard subdirectory layout under one base directory.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            chunk_dir: base.join("chunks"),
            encrypted_dir: base.join("encrypted"),
            merkle_dir: base.join("merkle_roots"),
            target_chunk_size: CHUNK_SIZE_MIN,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            stage_buffer: 8,
        }
    }

    /// Clamps a requested target size into the allowed window.
    pub fn clamp_target(target: usize) -> usize {
        target.clamp(CHUNK_SIZE_MIN, CHUNK_SIZE_MAX)
    }
}

//! Session manifest assembly and validation.

use chrono::{DateTime, Utc};

use lucid_crypto::hashing::sha256_hex;
use lucid_types::{ManifestChunkRef, SessionManifest, SessionMetadata};

use crate::error::AnchorError;

/// Builds and validates session manifests for anchoring.
#[derive(Debug, Default, Clone)]
pub struct ManifestBuilder;

impl ManifestBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Manifest hash over the identity fields, `0x`-prefixed hex SHA-256.
    pub fn calculate_manifest_hash(
        session_id: &str,
        owner_address: &str,
        started_at: &DateTime<Utc>,
        chunk_count: u32,
    ) -> String {
        let payload = format!(
            "{session_id}|{owner_address}|{}|{chunk_count}",
            started_at.to_rfc3339()
        );
        format!("0x{}", sha256_hex(payload.as_bytes()))
    }

    /// Assembles a manifest; the hash fields are derived, never supplied.
    #[allow(clippy::too_many_arguments)]
    pub fn build_manifest(
        &self,
        session_id: &str,
        owner_address: &str,
        merkle_root: &str,
        chunks: Vec<ManifestChunkRef>,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        metadata: SessionMetadata,
    ) -> SessionManifest {
        let chunk_count = chunks.len() as u32;
        SessionManifest {
            session_id: session_id.to_string(),
            owner_address: owner_address.to_string(),
            started_at,
            ended_at,
            manifest_hash: Self::calculate_manifest_hash(
                session_id,
                owner_address,
                &started_at,
                chunk_count,
            ),
            merkle_root: merkle_root.to_string(),
            chunk_count,
            chunks,
            codec: None,
            device_fingerprint: None,
            metadata,
        }
    }

    /// Structural manifest validation.
    pub fn validate_manifest(&self, manifest: &SessionManifest) -> Result<(), AnchorError> {
        if manifest.session_id.is_empty() {
            return Err(AnchorError::InvalidManifest("session id is required".into()));
        }
        if !lucid_types::is_hex_address(&manifest.owner_address) {
            return Err(AnchorError::InvalidManifest(format!(
                "owner address is not a 0x-hex address: {}",
                manifest.owner_address
            )));
        }
        if manifest.merkle_root.is_empty() {
            return Err(AnchorError::InvalidManifest("merkle root is required".into()));
        }
        if manifest.chunk_count as usize != manifest.chunks.len() {
            return Err(AnchorError::InvalidManifest(format!(
                "chunk count mismatch: {} != {}",
                manifest.chunk_count,
                manifest.chunks.len()
            )));
        }
        for (i, chunk) in manifest.chunks.iter().enumerate() {
            if chunk.ciphertext_hash.is_empty() {
                return Err(AnchorError::InvalidManifest(format!(
                    "chunk {i} missing ciphertext hash"
                )));
            }
            if chunk.size_bytes == 0 {
                return Err(AnchorError::InvalidManifest(format!(
                    "chunk {i} has zero size"
                )));
            }
        }
        Ok(())
    }
}

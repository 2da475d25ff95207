//! # Core Domain Entities
//!
//! Defines the entities shared between the session pipeline, the chain core
//! and the anchoring layer.
//!
//! Hashes that participate in chain linkage (`Block.hash`,
//! `Block.previous_hash`, Merkle roots) are carried as lowercase hex strings,
//! matching the document layout and the block-hash serialization. Raw digests
//! that never leave the pipeline (chunk checksums) are fixed 32-byte arrays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// A raw 32-byte digest (SHA-256 or BLAKE3, documented per field).
pub type Hash32 = [u8; 32];

// =============================================================================
// CLUSTER A: SESSIONS
// =============================================================================

/// Metadata for one session chunk.
///
/// Identity is `(session_id, sequence)`; sequence indices are contiguous
/// from 0. `plaintext_sha256` is taken before compression,
/// `ciphertext_blake3` after encryption (absent until the chunk has passed
/// through the encryptor).
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Chunk identifier, `<session_id>_chunk_<6-digit sequence>`.
    pub chunk_id: String,
    /// Owning session.
    pub session_id: String,
    /// Zero-based position within the session.
    pub sequence: u32,
    /// Size of the raw chunk before compression.
    pub original_size: u64,
    /// Size of the Zstd-compressed artifact on disk.
    pub compressed_size: u64,
    /// Size of the encrypted artifact, once encrypted.
    pub encrypted_size: Option<u64>,
    /// compressed / original, 0.0 for an empty chunk.
    pub compression_ratio: f64,
    /// SHA-256 of the raw chunk bytes.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub plaintext_sha256: Hash32,
    /// BLAKE3 of the encrypted artifact bytes.
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub ciphertext_blake3: Option<Hash32>,
    /// Path of the compressed artifact.
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

/// Lightweight chunk reference embedded in a [`SessionManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestChunkRef {
    pub sequence: u32,
    pub chunk_id: String,
    /// Hex BLAKE3 of the encrypted chunk bytes.
    pub ciphertext_hash: String,
    pub size_bytes: u64,
}

/// Optional codec information recorded with a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecInfo {
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub frame_rate: Option<u32>,
}

/// Closed set of session metadata fields; unknown keys are rejected at the
/// boundary instead of being carried through as a bag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionMetadata {
    pub project: Option<String>,
    pub environment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub priority: Option<u8>,
}

/// Root descriptor of one recorded session.
///
/// Sharded by `(owner_address, started_at)`. `chunk_count` always equals
/// `chunks.len()`, and `merkle_root` equals the recomputed root over the
/// chunk ciphertext hashes. Once `ended_at` is set it is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    pub session_id: String,
    /// Session owner, `0x` + 40 hex chars.
    pub owner_address: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Hex SHA-256 over the manifest identity fields.
    pub manifest_hash: String,
    /// Hex BLAKE3 Merkle root over the encrypted chunks.
    pub merkle_root: String,
    pub chunk_count: u32,
    pub chunks: Vec<ManifestChunkRef>,
    pub codec: Option<CodecInfo>,
    pub device_fingerprint: Option<String>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

/// Lifecycle of an anchoring attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    Pending,
    Confirmed,
    Failed,
}

impl AnchorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

/// One anchoring attempt for a session.
///
/// Created on submit; only the confirmation poller mutates `status`,
/// `confirmed_at` and `block_number`. Never deleted while the session exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnchor {
    /// Locally assigned anchoring id.
    pub anchoring_id: String,
    pub session_id: String,
    /// Transaction id on the primary chain.
    pub txid: String,
    pub block_number: Option<u64>,
    pub status: AnchorStatus,
    /// Merkle root at time of submission.
    pub merkle_root: String,
    pub submitted_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub gas_used: Option<u64>,
    pub error: Option<String>,
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// A chain transaction: opaque payload plus routing fields.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// `0x` + 40 hex chars.
    pub from_address: String,
    /// `0x` + 40 hex chars.
    pub to_address: String,
    pub value: u64,
    /// Opaque payload bytes, hex in documents.
    #[serde_as(as = "serde_with::hex::Hex")]
    #[serde(default)]
    pub data: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    /// Hex signature over the other fields.
    pub signature: String,
    pub fee: Option<f64>,
    /// Height of the including block, once confirmed.
    pub block_height: Option<u64>,
}

/// Mempool / confirmation state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Evicted,
    Expired,
    Invalid,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Evicted => "evicted",
            Self::Expired => "expired",
            Self::Invalid => "invalid",
            Self::Failed => "failed",
        }
    }
}

/// A block of the lucid_blocks chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    /// Hex hash of the block at `height - 1`; 64 zeros for genesis.
    pub previous_hash: String,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    /// Hex BLAKE3 Merkle root over the transaction ids.
    pub merkle_root: String,
    pub producer: String,
    /// Hex BLAKE3 over the serialized header fields.
    pub hash: String,
    /// Producer signature, set after creation.
    pub signature: String,
}

impl Block {
    /// Header projection, kept in sync with the block on every write.
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            height: self.height,
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
            timestamp: self.timestamp,
            merkle_root: self.merkle_root.clone(),
            producer: self.producer.clone(),
            transaction_count: self.transactions.len() as u32,
        }
    }
}

/// Block header for light clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: DateTime<Utc>,
    pub merkle_root: String,
    pub producer: String,
    pub transaction_count: u32,
}

/// Storage state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Pending,
    Confirmed,
}

/// Outcome of block or transaction validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.valid = false;
    }
}

// =============================================================================
// CLUSTER C: POOT CONSENSUS
// =============================================================================

/// Kinds of operational work a node can prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskProofType {
    RelayBandwidth,
    StorageAvailability,
    ValidationSignature,
    UptimeBeacon,
}

/// Typed proof payload, one shape per proof type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskProofValue {
    BytesTransferred { bytes_transferred: u64 },
    ChunksStored { chunks_stored: u64, size_bytes: u64 },
    ValidatedSessions { validated_sessions: u64 },
    UptimeSeconds { uptime_seconds: u64 },
}

/// One operational-work proof, sharded by `(slot, node_id)`.
///
/// Duplicate `(node_id, slot, type)` tuples are permitted; they aggregate in
/// the value dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProof {
    pub node_id: String,
    pub pool_id: Option<String>,
    pub slot: u64,
    #[serde(rename = "type")]
    pub proof_type: TaskProofType,
    pub value: TaskProofValue,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
}

/// Derived work tally for one entity over the current window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCredit {
    /// Node id or pool id.
    pub entity_id: String,
    pub credits: u64,
    /// Fraction of window slots with at least one proof, in [0, 1].
    pub live_score: f64,
    pub rank: u32,
}

/// Why a slot's primary was (or was not) chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    HighestCredits,
    CooldownSkip,
    VrfTieBreak,
    DensityThresholdNotMet,
}

/// Result metadata recorded with a leader schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub winner: Option<String>,
    pub reason: SelectionReason,
}

/// Leader schedule for one slot.
///
/// The primary is never an entity that held a primary slot within the last
/// `COOLDOWN_SLOTS` slots; `primary` is `None` when the density threshold is
/// not met.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderSchedule {
    pub slot: u64,
    pub primary: Option<String>,
    /// Skipped candidates in the order they were encountered.
    pub fallbacks: Vec<String>,
    pub result: SelectionResult,
}

/// Per-node work roll-up maintained by the work ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeWorkMetrics {
    pub node_id: String,
    pub uptime_seconds: u64,
    pub sessions_relayed: u64,
    pub bytes_relayed: u64,
    pub storage_challenges_passed: u64,
    pub validation_signatures: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

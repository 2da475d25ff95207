//! # Lucid Sessions
//!
//! The session pipeline: raw recording bytes in, anchored encrypted
//! artifacts out.
//!
//! ```text
//! raw bytes → chunker → encryptor → merkle builder → anchoring
//! ```
//!
//! Each stage is an independent component; the [`orchestrator`] drives one
//! session through all of them and persists pipeline state after every
//! transition. Chunk artifacts are idempotent, so a canceled or failed
//! session can be re-run under the same id.

pub mod chunker;
pub mod config;
pub mod encryptor;
pub mod error;
pub mod merkle;
pub mod orchestrator;
pub mod ports;

pub use chunker::SessionChunker;
pub use config::SessionPipelineConfig;
pub use encryptor::{EncryptedChunkRef, SessionEncryptor};
pub use error::SessionError;
pub use merkle::{verify_proof, MerkleProof, MerkleRootInfo, MerkleTreeBuilder};
pub use orchestrator::{PipelineStage, PipelineState, SessionOrchestrator};
pub use ports::{AnchorSubmission, SessionAnchoring};

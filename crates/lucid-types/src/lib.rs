//! # Lucid Shared Types
//!
//! Cross-crate domain entities for the Lucid dual-chain core.
//!
//! ## Clusters
//!
//! - **Sessions**: `ChunkMetadata`, `SessionManifest`, `SessionAnchor`
//! - **Chain**: `Block`, `BlockHeader`, `Transaction`, `ValidationResult`
//! - **Consensus**: `TaskProof`, `WorkCredit`, `LeaderSchedule`
//!
//! Payout entities are deliberately NOT defined here: the TRON payout router
//! is isolated from the chain core and owns its own types.

pub mod cancel;
pub mod entities;
pub mod errors;
pub mod ids;

pub use cancel::{CancelHandle, CancelToken};
pub use entities::*;
pub use errors::*;
pub use ids::*;

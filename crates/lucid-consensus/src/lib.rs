//! # Lucid Consensus
//!
//! Proof of Operational Tasks: leader selection weighted by verifiable
//! operational work (bandwidth relayed, chunks stored, validations signed,
//! uptime) rather than stake or compute.
//!
//! The engine tallies work credits over a sliding window, elects a primary
//! per 120-second slot under a 16-slot cooldown with a deterministic VRF
//! tie-break, and persists every schedule. The work ledger is the
//! append-only ingestion path for task proofs.

pub mod credits;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod params;
pub mod selection;
pub mod vrf;

pub use engine::PoOTConsensusEngine;
pub use error::ConsensusError;
pub use ledger::WorkLedger;
pub use params::*;

//! # Lucid Test Suite
//!
//! Unified test crate for cross-component scenarios.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── helpers.rs        # Shared fixtures: stores, signed txs, mock chain
//! └── integration/      # End-to-end scenarios
//!     ├── anchoring_flow.rs      # session pipeline → anchor → confirm
//!     ├── block_validation.rs    # tamper detection in stored blocks
//!     ├── chain_invariants.rs    # linkage / root / mempool invariants
//!     ├── chunk_integrity.rs     # encrypted artifact tamper detection
//!     ├── consensus_cooldown.rs  # leader election over 20 slots
//!     ├── mempool_eviction.rs    # admission under capacity pressure
//!     └── payout_batches.rs      # isolated TRON batch semantics
//! ```
//!
//! ## Running
//!
//! ```bash
//! cargo test -p lucid-tests
//! cargo test -p lucid-tests integration::consensus_cooldown
//! ```

#![allow(dead_code)]

pub mod helpers;
pub mod integration;

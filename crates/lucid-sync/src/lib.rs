//! # Lucid Sync
//!
//! Pulls remote chain state over HTTP and backfills missing blocks into
//! the local block manager, validating each one on the way in. Divergence
//! at the tip is reported, never rolled back; reconciliation belongs to a
//! higher layer.

pub mod synchronizer;

pub use synchronizer::{ChainSynchronizer, RemoteChainState, SyncError, SyncReport};

//! # Lucid On-Chain Client
//!
//! JSON-RPC wrapper over the remote EVM-compatible node that hosts the
//! LucidAnchors and LucidChunkStore contracts. Exposes exactly the two
//! contract interactions the core needs (`registerSession` and
//! `storeChunkMetadata`) plus receipt polling and `SessionRegistered`
//! log reads.
//!
//! Every submission is preceded by a gas estimate; estimates above the
//! configured circuit breaker abort without submitting.

pub mod client;
pub mod encoding;
pub mod error;
pub mod rpc;

pub use client::{
    ChunkCommitment, HttpOnChainClient, OnChainClient, OnChainConfig, SessionRegistration,
    TxOutcome, TxStatus,
};
pub use error::ChainClientError;

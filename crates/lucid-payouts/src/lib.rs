//! # Lucid Payouts
//!
//! The ISOLATED payment side of the dual-chain design: USDT-TRC20 payouts
//! on TRON, batched through one of two logical routers. `PayoutRouterV0`
//! serves non-KYC flows, `PayoutRouterKYC` the compliance-gated ones.
//!
//! This crate never participates in consensus or anchoring. It depends on
//! the persistence layer and nothing else from the chain core; TRON
//! addresses never appear in the chain collections and 0x-hex addresses
//! never appear here.

pub mod entities;
pub mod error;
pub mod ports;
pub mod router;
pub mod tron;

pub use entities::{
    PayoutBatch, PayoutContext, PayoutRequest, PayoutStatus, RouterType, is_tron_address,
};
pub use error::PayoutError;
pub use ports::{AccountResources, Trc20Transfer, TronRpc, TronTxState};
pub use router::{PayoutRouter, RouterStats};
pub use tron::{HttpTronClient, TronConfig, TronNetwork};

//! Outbound port to the TRON network.
//!
//! The router is constructed over this trait; a TRON client is a required
//! dependency, never simulated. Tests that want to run without a network
//! implement the trait themselves and opt in explicitly.

use async_trait::async_trait;

use crate::entities::RouterType;
use crate::error::PayoutError;

/// One TRC-20 transfer inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trc20Transfer {
    /// Recipient, TRON base58.
    pub to: String,
    /// Amount in micro-USDT (six decimals).
    pub amount_micro: u64,
}

/// Account resource snapshot used by the pre-submission guardrail.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountResources {
    pub energy_available: u64,
    pub bandwidth_available: u64,
}

/// Observed state of a TRON transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TronTxState {
    Pending,
    Confirmed,
    Failed,
}

/// TRON operations the payout router needs.
#[async_trait]
pub trait TronRpc: Send + Sync {
    /// Submits one grouped disbursement through the given logical router
    /// contract. Returns the transaction id shared by the whole batch.
    async fn send_batch_transfer(
        &self,
        router: RouterType,
        transfers: &[Trc20Transfer],
        fee_limit_sun: u64,
    ) -> Result<String, PayoutError>;

    /// Current state of a submitted transaction.
    async fn transaction_state(&self, txid: &str) -> Result<TronTxState, PayoutError>;

    /// Energy/bandwidth available to the payout account.
    async fn account_resources(&self) -> Result<AccountResources, PayoutError>;

    /// Energy a batch of this size is expected to consume.
    fn estimated_energy(&self, transfer_count: usize) -> u64 {
        // TRC-20 transfers land in the tens of thousands of energy each.
        transfer_count as u64 * 30_000
    }
}

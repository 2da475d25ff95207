//! On-chain client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::encoding::{
    encode_register_session, encode_store_chunk_metadata, session_registered_topic,
};
use crate::error::ChainClientError;
use crate::rpc::{parse_quantity, JsonRpcClient, DEFAULT_RPC_TIMEOUT_SECS};

/// Circuit-breaker default: estimates above this abort the submission.
pub const DEFAULT_GAS_LIMIT: u64 = 180_000;

/// Session registration parameters, in contract declaration order.
#[derive(Debug, Clone)]
pub struct SessionRegistration {
    pub session_id: String,
    /// Hex SHA-256 of the manifest identity fields.
    pub manifest_hash: String,
    pub started_at_unix: u64,
    pub owner: String,
    /// Hex BLAKE3 root over the encrypted chunks.
    pub merkle_root: String,
    pub chunk_count: u64,
}

/// Chunk commitment parameters for `storeChunkMetadata`.
#[derive(Debug, Clone)]
pub struct ChunkCommitment {
    pub session_id: String,
    pub chunk_idx: u64,
    pub ciphertext_hash: String,
    pub size_bytes: u64,
}

/// Terminal/transient state of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
    Pending,
}

/// Result of a contract submission or receipt poll.
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub txid: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: TxStatus,
}

/// Contract operations the anchor service depends on.
#[async_trait]
pub trait OnChainClient: Send + Sync {
    async fn register_session(
        &self,
        registration: &SessionRegistration,
    ) -> Result<TxOutcome, ChainClientError>;

    async fn store_chunk_metadata(
        &self,
        commitment: &ChunkCommitment,
    ) -> Result<TxOutcome, ChainClientError>;

    async fn get_transaction_status(
        &self,
        txid: &str,
    ) -> Result<(TxStatus, Option<u64>, Option<u64>), ChainClientError>;
}

/// Client configuration; all values injected, nothing read from the
/// environment here.
#[derive(Debug, Clone)]
pub struct OnChainConfig {
    pub rpc_url: String,
    pub anchors_address: String,
    pub chunk_store_address: String,
    pub gas_limit: u64,
    pub timeout: Duration,
}

impl OnChainConfig {
    pub fn new(rpc_url: String, anchors_address: String, chunk_store_address: String) -> Self {
        Self {
            rpc_url,
            anchors_address,
            chunk_store_address,
            gas_limit: DEFAULT_GAS_LIMIT,
            timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        }
    }
}

/// JSON-RPC implementation over an EVM-compatible node.
pub struct HttpOnChainClient {
    rpc: JsonRpcClient,
    config: OnChainConfig,
}

impl HttpOnChainClient {
    pub fn new(config: OnChainConfig) -> Result<Self, ChainClientError> {
        Ok(Self {
            rpc: JsonRpcClient::new(config.rpc_url.clone(), config.timeout)?,
            config,
        })
    }

    /// Estimates gas for a call and enforces the circuit breaker.
    async fn checked_estimate(
        &self,
        to: &str,
        data: &str,
    ) -> Result<u64, ChainClientError> {
        let estimate = self
            .rpc
            .call("eth_estimateGas", json!([{"to": to, "data": data}]))
            .await?;
        let estimated = parse_quantity(&estimate).ok_or_else(|| {
            ChainClientError::InvalidResponse(format!("bad gas estimate: {estimate}"))
        })?;
        if estimated > self.config.gas_limit {
            warn!(estimated, limit = self.config.gas_limit, "gas circuit breaker tripped");
            return Err(ChainClientError::GasLimitExceeded {
                estimated,
                limit: self.config.gas_limit,
            });
        }
        Ok(estimated)
    }

    async fn submit(&self, to: &str, call_data: Vec<u8>) -> Result<TxOutcome, ChainClientError> {
        let data = format!("0x{}", hex::encode(call_data));
        let gas = self.checked_estimate(to, &data).await?;

        let result = self
            .rpc
            .call(
                "eth_sendTransaction",
                json!([{"to": to, "data": data, "gas": format!("0x{gas:x}")}]),
            )
            .await?;
        let txid = result
            .as_str()
            .ok_or_else(|| ChainClientError::InvalidResponse(format!("bad txid: {result}")))?
            .to_string();

        Ok(TxOutcome {
            txid,
            block_number: None,
            gas_used: None,
            status: TxStatus::Pending,
        })
    }

    /// `SessionRegistered` logs at or after `from_block`, as raw log
    /// objects for the caller to correlate.
    pub async fn session_registered_logs(
        &self,
        from_block: u64,
    ) -> Result<Vec<Value>, ChainClientError> {
        let logs = self
            .rpc
            .call(
                "eth_getLogs",
                json!([{
                    "address": self.config.anchors_address,
                    "fromBlock": format!("0x{from_block:x}"),
                    "topics": [session_registered_topic()],
                }]),
            )
            .await?;
        logs.as_array()
            .cloned()
            .ok_or_else(|| ChainClientError::InvalidResponse("logs is not an array".into()))
    }
}

#[async_trait]
impl OnChainClient for HttpOnChainClient {
    async fn register_session(
        &self,
        registration: &SessionRegistration,
    ) -> Result<TxOutcome, ChainClientError> {
        let call_data = encode_register_session(
            &registration.session_id,
            &registration.manifest_hash,
            registration.started_at_unix,
            &registration.owner,
            &registration.merkle_root,
            registration.chunk_count,
        )?;
        let outcome = self.submit(&self.config.anchors_address, call_data).await?;
        info!(
            session_id = %registration.session_id,
            txid = %outcome.txid,
            "registerSession submitted"
        );
        Ok(outcome)
    }

    async fn store_chunk_metadata(
        &self,
        commitment: &ChunkCommitment,
    ) -> Result<TxOutcome, ChainClientError> {
        let call_data = encode_store_chunk_metadata(
            &commitment.session_id,
            commitment.chunk_idx,
            &commitment.ciphertext_hash,
            commitment.size_bytes,
        )?;
        let outcome = self
            .submit(&self.config.chunk_store_address, call_data)
            .await?;
        info!(
            session_id = %commitment.session_id,
            chunk_idx = commitment.chunk_idx,
            txid = %outcome.txid,
            "storeChunkMetadata submitted"
        );
        Ok(outcome)
    }

    async fn get_transaction_status(
        &self,
        txid: &str,
    ) -> Result<(TxStatus, Option<u64>, Option<u64>), ChainClientError> {
        let receipt = self
            .rpc
            .call("eth_getTransactionReceipt", json!([txid]))
            .await?;
        if receipt.is_null() {
            return Ok((TxStatus::Pending, None, None));
        }

        let block_number = parse_quantity(&receipt["blockNumber"]);
        let gas_used = parse_quantity(&receipt["gasUsed"]);
        let status = match receipt["status"].as_str() {
            Some("0x1") => TxStatus::Success,
            Some(_) => TxStatus::Failed,
            None => TxStatus::Pending,
        };
        Ok((status, block_number, gas_used))
    }
}

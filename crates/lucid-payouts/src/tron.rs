//! TRON HTTP client.
//!
//! Talks to a TRON full node's HTTP API: trigger the router contract,
//! sign locally with secp256k1, broadcast, and poll transaction info and
//! account resources. Supports mainnet, Shasta and Nile.

use std::time::Duration;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::entities::RouterType;
use crate::error::PayoutError;
use crate::ports::{AccountResources, TronRpc, Trc20Transfer, TronTxState};

/// Default fee limit per batch: 100 TRX, in SUN.
pub const DEFAULT_FEE_LIMIT_SUN: u64 = 100_000_000;

/// Default TRON HTTP timeout.
pub const DEFAULT_TRON_TIMEOUT_SECS: u64 = 20;

/// TRON network selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TronNetwork {
    Mainnet,
    Shasta,
    Nile,
}

impl TronNetwork {
    pub fn api_base(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.trongrid.io",
            Self::Shasta => "https://api.shasta.trongrid.io",
            Self::Nile => "https://nile.trongrid.io",
        }
    }

    /// USDT-TRC20 contract on this network.
    pub fn usdt_contract(&self) -> &'static str {
        match self {
            Self::Mainnet => "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t",
            Self::Shasta => "TG3XXyExBkPp9nzdajDZsozEu4BkaSJozs",
            Self::Nile => "TXLAQ63Xg1NAzckPwKHvzw7CSEmLMEqcdj",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mainnet" => Some(Self::Mainnet),
            "shasta" => Some(Self::Shasta),
            "nile" => Some(Self::Nile),
            _ => None,
        }
    }
}

/// TRON client configuration; secrets injected, never read here.
#[derive(Clone)]
pub struct TronConfig {
    pub network: TronNetwork,
    /// Hex-encoded secp256k1 private key of the payout account.
    pub private_key_hex: String,
    /// Base58 address of the `PayoutRouterV0` contract.
    pub router_v0_address: String,
    /// Base58 address of the `PayoutRouterKYC` contract.
    pub router_kyc_address: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for TronConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TronConfig")
            .field("network", &self.network)
            .field("private_key_hex", &"<redacted>")
            .field("router_v0_address", &self.router_v0_address)
            .field("router_kyc_address", &self.router_kyc_address)
            .finish()
    }
}

/// Decodes a base58check TRON address into its 21-byte form (0x41 prefix).
pub fn decode_tron_address(address: &str) -> Result<[u8; 21], PayoutError> {
    let bytes = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|_| PayoutError::InvalidAddress(address.to_string()))?;
    if bytes.len() != 21 || bytes[0] != 0x41 {
        return Err(PayoutError::InvalidAddress(address.to_string()));
    }
    let mut out = [0u8; 21];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// ABI-encodes `disburse(address[],uint256[])` for the router contracts.
fn encode_disburse(transfers: &[Trc20Transfer]) -> Result<String, PayoutError> {
    let n = transfers.len();
    let mut words: Vec<[u8; 32]> = Vec::with_capacity(4 + 2 * n);

    // Two dynamic-array head slots, then each array as length + items.
    let mut head = [0u8; 32];
    head[24..].copy_from_slice(&(64u64).to_be_bytes());
    words.push(head);
    let mut head2 = [0u8; 32];
    head2[24..].copy_from_slice(&((64 + 32 * (n as u64 + 1)) as u64).to_be_bytes());
    words.push(head2);

    let mut len_word = [0u8; 32];
    len_word[24..].copy_from_slice(&(n as u64).to_be_bytes());
    words.push(len_word);
    for transfer in transfers {
        let decoded = decode_tron_address(&transfer.to)?;
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&decoded[1..]); // drop the 0x41 prefix
        words.push(word);
    }

    words.push(len_word);
    for transfer in transfers {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&transfer.amount_micro.to_be_bytes());
        words.push(word);
    }

    let mut encoded = String::with_capacity(words.len() * 64);
    for word in words {
        encoded.push_str(&hex::encode(word));
    }
    Ok(encoded)
}

/// HTTP adapter over a TRON full node.
pub struct HttpTronClient {
    http: reqwest::Client,
    config: TronConfig,
    signing_key: SigningKey,
    owner_address: String,
}

impl HttpTronClient {
    pub fn new(config: TronConfig) -> Result<Self, PayoutError> {
        let key_bytes = hex::decode(&config.private_key_hex)
            .map_err(|_| PayoutError::Tron("private key is not hex".into()))?;
        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| PayoutError::Tron(format!("bad private key: {e}")))?;
        let owner_address = derive_address(&signing_key);
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PayoutError::Tron(e.to_string()))?;

        info!(network = ?config.network, owner = %owner_address, "TRON client initialized");
        Ok(Self {
            http,
            config,
            signing_key,
            owner_address,
        })
    }

    pub fn owner_address(&self) -> &str {
        &self.owner_address
    }

    fn router_address(&self, router: RouterType) -> &str {
        match router {
            RouterType::NonKyc => &self.config.router_v0_address,
            RouterType::KycGated => &self.config.router_kyc_address,
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, PayoutError> {
        let url = format!("{}{path}", self.config.network.api_base());
        debug!(path, "tron api call");
        Ok(self.http.post(&url).json(&body).send().await?.json().await?)
    }

    fn sign_txid(&self, txid_hex: &str) -> Result<String, PayoutError> {
        let digest = hex::decode(txid_hex)
            .map_err(|_| PayoutError::Tron(format!("bad txID from node: {txid_hex}")))?;
        let (signature, recovery) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| PayoutError::Tron(format!("signing failed: {e}")))?;
        Ok(format!(
            "{}{:02x}",
            hex::encode(signature.to_bytes()),
            recovery.to_byte()
        ))
    }
}

#[async_trait]
impl TronRpc for HttpTronClient {
    async fn send_batch_transfer(
        &self,
        router: RouterType,
        transfers: &[Trc20Transfer],
        fee_limit_sun: u64,
    ) -> Result<String, PayoutError> {
        let parameter = encode_disburse(transfers)?;
        let trigger = self
            .post(
                "/wallet/triggersmartcontract",
                json!({
                    "owner_address": self.owner_address,
                    "contract_address": self.router_address(router),
                    "function_selector": "disburse(address[],uint256[])",
                    "parameter": parameter,
                    "fee_limit": fee_limit_sun,
                    "visible": true,
                }),
            )
            .await?;

        let transaction = trigger
            .get("transaction")
            .cloned()
            .ok_or_else(|| PayoutError::Tron(format!("trigger failed: {trigger}")))?;
        let txid = transaction["txID"]
            .as_str()
            .ok_or_else(|| PayoutError::Tron("transaction has no txID".into()))?
            .to_string();

        let signature = self.sign_txid(&txid)?;
        let mut signed = transaction;
        signed["signature"] = json!([signature]);

        let broadcast = self.post("/wallet/broadcasttransaction", signed).await?;
        let ok = broadcast["result"].as_bool().unwrap_or(false);
        if !ok {
            warn!(%txid, response = %broadcast, "tron broadcast rejected");
            return Err(PayoutError::Tron(format!(
                "broadcast rejected: {}",
                broadcast["message"].as_str().unwrap_or("unknown")
            )));
        }

        info!(%txid, transfers = transfers.len(), "tron batch submitted");
        Ok(txid)
    }

    async fn transaction_state(&self, txid: &str) -> Result<TronTxState, PayoutError> {
        let info = self
            .post("/wallet/gettransactioninfobyid", json!({"value": txid}))
            .await?;
        if info.as_object().map_or(true, |o| o.is_empty()) {
            return Ok(TronTxState::Pending);
        }
        match info["receipt"]["result"].as_str() {
            Some("SUCCESS") => Ok(TronTxState::Confirmed),
            Some(_) => Ok(TronTxState::Failed),
            // Plain TRX-level success has no receipt result field.
            None if info.get("blockNumber").is_some() => Ok(TronTxState::Confirmed),
            None => Ok(TronTxState::Pending),
        }
    }

    async fn account_resources(&self) -> Result<AccountResources, PayoutError> {
        let resources = self
            .post(
                "/wallet/getaccountresource",
                json!({"address": self.owner_address, "visible": true}),
            )
            .await?;
        let energy_limit = resources["EnergyLimit"].as_u64().unwrap_or(0);
        let energy_used = resources["EnergyUsed"].as_u64().unwrap_or(0);
        let net_limit = resources["NetLimit"].as_u64().unwrap_or(0)
            + resources["freeNetLimit"].as_u64().unwrap_or(0);
        let net_used = resources["NetUsed"].as_u64().unwrap_or(0)
            + resources["freeNetUsed"].as_u64().unwrap_or(0);
        Ok(AccountResources {
            energy_available: energy_limit.saturating_sub(energy_used),
            bandwidth_available: net_limit.saturating_sub(net_used),
        })
    }
}

/// Base58check TRON address for a signing key.
fn derive_address(key: &SigningKey) -> String {
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use sha3::Digest as _;
    let verifying = key.verifying_key();
    let point = verifying.to_encoded_point(false);
    // Keccak over the uncompressed point without the 0x04 tag, low 20 bytes.
    let mut keccak = sha3::Keccak256::new();
    keccak.update(&point.as_bytes()[1..]);
    let digest = keccak.finalize();

    let mut payload = [0u8; 21];
    payload[0] = 0x41;
    payload[1..].copy_from_slice(&digest[12..]);

    let checksum = Sha256::digest(Sha256::digest(payload));
    let mut full = payload.to_vec();
    full.extend_from_slice(&checksum[..4]);
    bs58::encode(full).into_string()
}

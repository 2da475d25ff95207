//! Node configuration.
//!
//! All sensitive and deployment-specific values are injected through the
//! environment; nothing is hardcoded and nothing is read at import time.
//! Validation failures are fatal at boot with a non-zero exit code.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use lucid_payouts::TronNetwork;

/// Configuration errors; each maps to a non-zero process exit.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("{name} looks like a placeholder secret")]
    PlaceholderSecret { name: &'static str },

    #[error("{name} points at an unsafe host for production: {value}")]
    UnsafeHost { name: &'static str, value: String },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Document-store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend URL (`MONGO_URL`); absent selects the file-backed adapter.
    pub url: Option<String>,
    /// Database / directory name (`MONGO_DB`).
    pub db: String,
    pub connect_timeout: Duration,
    pub max_pool_size: u32,
}

/// Primary-chain client settings.
#[derive(Debug, Clone)]
pub struct OnChainSettings {
    pub rpc_url: String,
    pub anchors_address: String,
    pub chunk_store_address: String,
    pub gas_limit: u64,
}

/// TRON payout settings (isolated chain).
#[derive(Clone)]
pub struct TronSettings {
    pub network: TronNetwork,
    pub private_key_hex: String,
    pub router_v0_address: String,
    pub router_kyc_address: String,
}

impl std::fmt::Debug for TronSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TronSettings")
            .field("network", &self.network)
            .field("private_key_hex", &"<redacted>")
            .finish()
    }
}

/// Pipeline sizing knobs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub data_dir: PathBuf,
    pub target_chunk_size: usize,
    pub compression_level: i32,
    pub stage_buffer: usize,
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub onchain: OnChainSettings,
    /// Absent when this node does not run the payout router.
    pub tron: Option<TronSettings>,
    pub pipeline: PipelineSettings,
    pub block_storage_path: PathBuf,
    /// Remote engine for the synchronizer; absent disables sync.
    pub sync_engine_url: Option<String>,
    pub log_filter: String,
    /// Production mode tightens host validation.
    pub production: bool,
}

const PLACEHOLDER_SECRETS: &[&str] = &["", "changeme", "placeholder", "secret", "xxx", "todo"];

fn looks_unsafe(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1") || url.contains("0.0.0.0")
}

impl Config {
    /// Reads configuration from an environment snapshot. Taking the map as
    /// a parameter keeps this a pure function; `from_env` supplies the real
    /// process environment.
    pub fn from_map(env: &HashMap<String, String>) -> Result<Config, ConfigError> {
        let get = |key: &'static str| env.get(key).map(String::to_owned);
        let required = |key: &'static str| get(key).ok_or(ConfigError::MissingRequired(key));

        let production = get("LUCID_ENV").as_deref() == Some("production");

        let onchain = OnChainSettings {
            rpc_url: required("ON_CHAIN_RPC_URL")?,
            anchors_address: required("LUCID_ANCHORS_ADDRESS")?,
            chunk_store_address: required("LUCID_CHUNK_STORE_ADDRESS")?,
            gas_limit: parse_or("LUCID_GAS_LIMIT", get("LUCID_GAS_LIMIT"), 180_000)?,
        };
        if production && looks_unsafe(&onchain.rpc_url) {
            return Err(ConfigError::UnsafeHost {
                name: "ON_CHAIN_RPC_URL",
                value: onchain.rpc_url,
            });
        }

        let tron = match get("TRON_PRIVATE_KEY") {
            None => None,
            Some(key) => {
                if PLACEHOLDER_SECRETS.contains(&key.to_lowercase().as_str()) {
                    return Err(ConfigError::PlaceholderSecret {
                        name: "TRON_PRIVATE_KEY",
                    });
                }
                let network_name = get("TRON_NETWORK").unwrap_or_else(|| "shasta".into());
                let network = TronNetwork::parse(&network_name).ok_or(ConfigError::InvalidValue {
                    name: "TRON_NETWORK",
                    value: network_name,
                })?;
                Some(TronSettings {
                    network,
                    private_key_hex: key,
                    router_v0_address: required("LUCID_PAYOUT_ROUTER_V0")?,
                    router_kyc_address: required("LUCID_PAYOUT_ROUTER_KYC")?,
                })
            }
        };

        let store = StoreConfig {
            url: get("MONGO_URL"),
            db: get("MONGO_DB").unwrap_or_else(|| "lucid".into()),
            connect_timeout: Duration::from_millis(parse_or(
                "MONGO_CONNECT_TIMEOUT_MS",
                get("MONGO_CONNECT_TIMEOUT_MS"),
                10_000,
            )?),
            max_pool_size: parse_or("MONGO_MAX_POOL_SIZE", get("MONGO_MAX_POOL_SIZE"), 50)? as u32,
        };
        if production {
            if let Some(url) = store.url.as_deref().filter(|u| looks_unsafe(u)) {
                return Err(ConfigError::UnsafeHost {
                    name: "MONGO_URL",
                    value: url.to_string(),
                });
            }
        }

        let data_dir = PathBuf::from(get("LUCID_DATA_DIR").unwrap_or_else(|| "/data".into()));
        let pipeline = PipelineSettings {
            data_dir: data_dir.clone(),
            target_chunk_size: parse_or(
                "LUCID_CHUNK_SIZE",
                get("LUCID_CHUNK_SIZE"),
                8 * 1024 * 1024,
            )? as usize,
            compression_level: parse_or("LUCID_COMPRESSION_LEVEL", get("LUCID_COMPRESSION_LEVEL"), 3)?
                as i32,
            stage_buffer: parse_or("LUCID_STAGE_BUFFER", get("LUCID_STAGE_BUFFER"), 8)? as usize,
        };

        Ok(Config {
            store,
            onchain,
            tron,
            pipeline,
            block_storage_path: data_dir.join("blocks"),
            sync_engine_url: get("BLOCKCHAIN_ENGINE_URL"),
            log_filter: get("LUCID_LOG_LEVEL").unwrap_or_else(|| "info".into()),
            production,
        })
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&env)
    }
}

fn parse_or(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}

// usize knob helper.
impl PipelineSettings {
    pub fn session_config(&self) -> lucid_sessions::SessionPipelineConfig {
        let mut config = lucid_sessions::SessionPipelineConfig::under(&self.data_dir);
        config.target_chunk_size = self.target_chunk_size;
        config.compression_level = self.compression_level;
        config.stage_buffer = self.stage_buffer;
        config
    }
}

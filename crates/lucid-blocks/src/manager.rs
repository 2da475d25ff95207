//! Block manager.
//!
//! Owns the `blocks`, `block_headers` and `block_metadata` collections, the
//! process-local caches and the JSON disk mirror. Serializes `add_block`
//! through the store's unique height index: when two producers race the same
//! height, the loser sees a duplicate-key insert and treats it as a no-op.

use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use lucid_store::{DocumentStore, Filter, FindOptions, IndexSpec, SortOrder, StoreError};
use lucid_types::{
    Block, BlockHeader, BlockStatus, Transaction, TransactionStatus, ValidationResult,
    ZERO_ADDRESS,
};

use crate::cache::{BlockCache, BLOCK_CACHE_CAPACITY};
use crate::error::BlockError;
use crate::hashing::{compute_block_hash, compute_transaction_merkle_root, ZERO_HASH};
use crate::validation::{validate_block, MAX_TRANSACTIONS_PER_BLOCK};
use std::sync::Arc;

/// Target block time, used by the sync-freshness heuristic.
pub const BLOCK_TIME_SECONDS: i64 = 10;

const BLOCKS: &str = "blocks";
const BLOCK_HEADERS: &str = "block_headers";
const BLOCK_METADATA: &str = "block_metadata";
const TRANSACTIONS: &str = "transactions";

#[derive(Debug, Default, Clone)]
struct ChainState {
    current_height: u64,
    latest_block_hash: String,
    genesis_hash: Option<String>,
    has_blocks: bool,
}

/// Summary of the chain exposed to operators and the REST shell.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlockchainInfo {
    pub network: String,
    pub consensus: String,
    pub current_height: u64,
    pub latest_block_hash: String,
    pub genesis_block_hash: Option<String>,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub block_size_limit_bytes: usize,
    pub max_transactions_per_block: usize,
}

/// Liveness view of the chain tip.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlockchainStatus {
    pub is_synced: bool,
    pub current_height: u64,
    pub latest_block_hash: String,
    pub last_block_time: Option<DateTime<Utc>>,
    pub seconds_since_last_block: Option<i64>,
    pub cache_size: usize,
}

/// Result of a chain integrity sweep.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChainIntegrityReport {
    pub is_valid: bool,
    pub blocks_checked: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub start_height: u64,
    pub end_height: u64,
}

/// Block creation, validation, storage and retrieval.
pub struct BlockManager {
    store: Arc<dyn DocumentStore>,
    storage_path: Option<PathBuf>,
    state: RwLock<ChainState>,
    cache: Mutex<BlockCache>,
}

impl BlockManager {
    pub fn new(store: Arc<dyn DocumentStore>, storage_path: Option<PathBuf>) -> Self {
        Self {
            store,
            storage_path,
            state: RwLock::new(ChainState::default()),
            cache: Mutex::new(BlockCache::new(BLOCK_CACHE_CAPACITY)),
        }
    }

    /// Declares indexes, loads chain state, creates genesis on an empty
    /// chain and warms the cache.
    pub async fn initialize(&self) -> Result<(), BlockError> {
        self.setup_indexes().await?;
        if let Some(path) = &self.storage_path {
            tokio::fs::create_dir_all(path).await?;
        }
        self.load_chain_state().await?;

        let needs_genesis = !self.state.read().expect("chain state lock").has_blocks;
        if needs_genesis {
            self.create_genesis_block().await?;
        }
        self.warm_cache().await?;

        let state = self.state.read().expect("chain state lock").clone();
        info!(height = state.current_height, "block manager initialized");
        Ok(())
    }

    async fn setup_indexes(&self) -> Result<(), BlockError> {
        let s = &self.store;
        s.ensure_index(BLOCKS, IndexSpec::unique(&["height"])).await?;
        s.ensure_index(BLOCKS, IndexSpec::unique(&["hash"])).await?;
        s.ensure_index(BLOCKS, IndexSpec::plain(&["timestamp"])).await?;
        s.ensure_index(BLOCKS, IndexSpec::plain(&["producer"])).await?;
        s.ensure_index(BLOCKS, IndexSpec::plain(&["previous_hash"])).await?;
        s.declare_shard_key(BLOCKS, &["height"]).await?;

        s.ensure_index(BLOCK_HEADERS, IndexSpec::unique(&["height"])).await?;
        s.ensure_index(BLOCK_HEADERS, IndexSpec::unique(&["hash"])).await?;

        s.ensure_index(BLOCK_METADATA, IndexSpec::plain(&["block_hash"])).await?;
        s.ensure_index(BLOCK_METADATA, IndexSpec::plain(&["status"])).await?;
        Ok(())
    }

    async fn load_chain_state(&self) -> Result<(), BlockError> {
        let latest = self
            .store
            .find_one(
                BLOCKS,
                Filter::All,
                FindOptions::sorted_by("height", SortOrder::Descending),
            )
            .await?;

        let genesis = self
            .store
            .find_one(BLOCKS, Filter::eq("height", 0), FindOptions::default())
            .await?;

        let mut state = self.state.write().expect("chain state lock");
        match latest {
            Some(doc) => {
                state.current_height = doc["height"].as_u64().unwrap_or(0);
                state.latest_block_hash = doc["hash"].as_str().unwrap_or_default().to_string();
                state.has_blocks = true;
            }
            None => {
                state.current_height = 0;
                state.latest_block_hash.clear();
                state.has_blocks = false;
            }
        }
        state.genesis_hash = genesis
            .and_then(|doc| doc["hash"].as_str().map(str::to_string));
        Ok(())
    }

    async fn warm_cache(&self) -> Result<(), BlockError> {
        let docs = self
            .store
            .find(
                BLOCKS,
                Filter::All,
                FindOptions::sorted_by("height", SortOrder::Descending)
                    .with_limit(BLOCK_CACHE_CAPACITY),
            )
            .await?;
        let mut cache = self.cache.lock().expect("block cache lock");
        for doc in docs.into_iter().rev() {
            if let Ok(block) = serde_json::from_value::<Block>(strip_id(doc)) {
                cache.insert(block);
            }
        }
        debug!(cached = cache.len(), "block cache warmed");
        Ok(())
    }

    /// Creates the genesis block: one zero-address transaction carrying the
    /// network descriptor, signed with the literal genesis signature.
    async fn create_genesis_block(&self) -> Result<(), BlockError> {
        let timestamp = Utc::now();
        let descriptor = json!({
            "type": "genesis",
            "network": "lucid_blocks",
            "version": "1.0.0",
            "consensus": "PoOT",
            "created_at": timestamp.to_rfc3339(),
        });

        let genesis_tx = Transaction {
            id: format!("genesis_{}", timestamp.timestamp()),
            from_address: ZERO_ADDRESS.into(),
            to_address: ZERO_ADDRESS.into(),
            value: 0,
            data: descriptor.to_string().into_bytes(),
            timestamp,
            signature: "genesis_signature".into(),
            fee: None,
            block_height: Some(0),
        };

        let transactions = vec![genesis_tx];
        let merkle_root = compute_transaction_merkle_root(&transactions);
        let hash = compute_block_hash(0, ZERO_HASH, &timestamp, &merkle_root, "genesis", 1);
        let genesis = Block {
            height: 0,
            previous_hash: ZERO_HASH.into(),
            timestamp,
            transactions,
            merkle_root,
            producer: "genesis".into(),
            hash,
            signature: "genesis_signature".into(),
        };

        self.store_block(&genesis).await?;
        let mut state = self.state.write().expect("chain state lock");
        state.current_height = 0;
        state.latest_block_hash = genesis.hash.clone();
        state.genesis_hash = Some(genesis.hash.clone());
        state.has_blocks = true;
        drop(state);

        self.cache.lock().expect("block cache lock").insert(genesis.clone());
        info!(hash = %genesis.hash, "genesis block created");
        Ok(())
    }

    /// Assembles the next block over the given transactions. The producer
    /// signature is the caller's responsibility, applied after creation.
    pub async fn create_block(
        &self,
        transactions: Vec<Transaction>,
        producer: &str,
    ) -> Result<Block, BlockError> {
        if transactions.len() > MAX_TRANSACTIONS_PER_BLOCK {
            return Err(BlockError::TooManyTransactions {
                count: transactions.len(),
                max: MAX_TRANSACTIONS_PER_BLOCK,
            });
        }

        let (current_height, has_blocks) = {
            let state = self.state.read().expect("chain state lock");
            (state.current_height, state.has_blocks)
        };

        let (height, previous_hash) = if has_blocks {
            let prev = self
                .get_block_by_height(current_height)
                .await?
                .ok_or(BlockError::PreviousBlockNotFound(current_height))?;
            (current_height + 1, prev.hash)
        } else {
            (0, ZERO_HASH.to_string())
        };

        let timestamp = Utc::now();
        let merkle_root = compute_transaction_merkle_root(&transactions);
        let hash = compute_block_hash(
            height,
            &previous_hash,
            &timestamp,
            &merkle_root,
            producer,
            transactions.len(),
        );

        info!(height, count = transactions.len(), "block created");
        Ok(Block {
            height,
            previous_hash,
            timestamp,
            transactions,
            merkle_root,
            producer: producer.to_string(),
            hash,
            signature: String::new(),
        })
    }

    /// Full validation: structural checks plus chain-linkage lookups.
    pub async fn validate_block(&self, block: &Block) -> Result<ValidationResult, BlockError> {
        let previous = if block.height == 0 {
            None
        } else {
            self.get_block_by_height(block.height - 1)
                .await?
                .map(|b| b.hash)
        };
        Ok(validate_block(block, previous.as_deref()))
    }

    /// Validates and stores a block, updating chain state and caches.
    ///
    /// Returns `Ok(false)` when the block already exists (same hash, or a
    /// concurrent add won the height race).
    pub async fn add_block(&self, block: &Block) -> Result<bool, BlockError> {
        let validation = self.validate_block(block).await?;
        if !validation.valid {
            return Err(BlockError::InvalidBlock {
                height: block.height,
                errors: validation.errors,
            });
        }

        if self.get_block_by_hash(&block.hash).await?.is_some() {
            warn!(hash = %block.hash, "block already exists");
            return Ok(false);
        }

        match self.store_block(block).await {
            Ok(()) => {}
            // Unique height index: a concurrent producer won this height.
            Err(BlockError::Store(StoreError::DuplicateKey { .. })) => {
                warn!(height = block.height, "lost height race, treating as no-op");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        {
            let mut state = self.state.write().expect("chain state lock");
            if block.height >= state.current_height || !state.has_blocks {
                state.current_height = block.height;
                state.latest_block_hash = block.hash.clone();
            }
            state.has_blocks = true;
        }
        self.cache.lock().expect("block cache lock").insert(block.clone());

        info!(height = block.height, hash = %block.hash, "block added");
        Ok(true)
    }

    async fn store_block(&self, block: &Block) -> Result<(), BlockError> {
        let mut doc = serde_json::to_value(block)?;
        doc["_id"] = json!(block.hash);
        self.store.insert(BLOCKS, doc).await?;

        let header: BlockHeader = block.header();
        let mut header_doc = serde_json::to_value(&header)?;
        header_doc["_id"] = json!(block.hash);
        self.store.insert(BLOCK_HEADERS, header_doc).await?;

        for tx in &block.transactions {
            let mut tx_doc = serde_json::to_value(tx)?;
            tx_doc["_id"] = json!(tx.id);
            tx_doc["status"] = json!(TransactionStatus::Confirmed.as_str());
            tx_doc["block_height"] = json!(block.height);
            // Upsert: the transaction processor may already have moved this
            // transaction out of the mempool.
            self.store.upsert(TRANSACTIONS, &tx.id, tx_doc).await?;
        }

        let size_bytes = serde_json::to_vec(block)?.len();
        self.store
            .insert(
                BLOCK_METADATA,
                json!({
                    "_id": block.hash,
                    "block_hash": block.hash,
                    "height": block.height,
                    "status": BlockStatus::Confirmed,
                    "size_bytes": size_bytes,
                    "transaction_count": block.transactions.len(),
                    "created_at": Utc::now(),
                }),
            )
            .await?;

        if let Some(path) = &self.storage_path {
            let file = path.join(format!("block_{:010}.json", block.height));
            tokio::fs::write(&file, serde_json::to_vec_pretty(block)?).await?;
        }
        Ok(())
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Result<Option<Block>, BlockError> {
        if let Some(block) = self.cache.lock().expect("block cache lock").get_by_hash(hash) {
            return Ok(Some(block));
        }
        let doc = self
            .store
            .find_one(BLOCKS, Filter::eq("hash", hash), FindOptions::default())
            .await?;
        let block = doc
            .map(|d| serde_json::from_value::<Block>(strip_id(d)))
            .transpose()?;
        if let Some(block) = &block {
            self.cache.lock().expect("block cache lock").insert(block.clone());
        }
        Ok(block)
    }

    pub async fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, BlockError> {
        if let Some(block) = self
            .cache
            .lock()
            .expect("block cache lock")
            .get_by_height(height)
        {
            return Ok(Some(block));
        }
        let doc = self
            .store
            .find_one(BLOCKS, Filter::eq("height", height), FindOptions::default())
            .await?;
        let block = doc
            .map(|d| serde_json::from_value::<Block>(strip_id(d)))
            .transpose()?;
        if let Some(block) = &block {
            self.cache.lock().expect("block cache lock").insert(block.clone());
        }
        Ok(block)
    }

    pub async fn get_latest_block(&self) -> Result<Option<Block>, BlockError> {
        let hash = self
            .state
            .read()
            .expect("chain state lock")
            .latest_block_hash
            .clone();
        if hash.is_empty() {
            return Ok(None);
        }
        self.get_block_by_hash(&hash).await
    }

    /// Blocks in ascending height order from `start_height`.
    pub async fn get_blocks(
        &self,
        start_height: u64,
        limit: usize,
    ) -> Result<Vec<Block>, BlockError> {
        let docs = self
            .store
            .find(
                BLOCKS,
                Filter::Gte("height".into(), json!(start_height)),
                FindOptions::sorted_by("height", SortOrder::Ascending).with_limit(limit),
            )
            .await?;
        docs.into_iter()
            .map(|d| serde_json::from_value(strip_id(d)).map_err(BlockError::from))
            .collect()
    }

    /// Headers for light clients, ascending from `start_height`.
    pub async fn get_block_headers(
        &self,
        start_height: u64,
        limit: usize,
    ) -> Result<Vec<BlockHeader>, BlockError> {
        let docs = self
            .store
            .find(
                BLOCK_HEADERS,
                Filter::Gte("height".into(), json!(start_height)),
                FindOptions::sorted_by("height", SortOrder::Ascending).with_limit(limit),
            )
            .await?;
        docs.into_iter()
            .map(|d| serde_json::from_value(strip_id(d)).map_err(BlockError::from))
            .collect()
    }

    pub fn current_height(&self) -> u64 {
        self.state.read().expect("chain state lock").current_height
    }

    pub fn latest_block_hash(&self) -> String {
        self.state
            .read()
            .expect("chain state lock")
            .latest_block_hash
            .clone()
    }

    pub async fn blockchain_info(&self) -> Result<BlockchainInfo, BlockError> {
        let total_blocks = self.store.count(BLOCKS, Filter::All).await?;
        let total_transactions = self
            .store
            .sum(BLOCK_METADATA, Filter::All, "transaction_count")
            .await? as u64;
        let state = self.state.read().expect("chain state lock").clone();
        Ok(BlockchainInfo {
            network: "lucid_blocks".into(),
            consensus: "PoOT".into(),
            current_height: state.current_height,
            latest_block_hash: state.latest_block_hash,
            genesis_block_hash: state.genesis_hash,
            total_blocks,
            total_transactions,
            block_size_limit_bytes: crate::validation::BLOCK_SIZE_LIMIT_BYTES,
            max_transactions_per_block: MAX_TRANSACTIONS_PER_BLOCK,
        })
    }

    pub async fn blockchain_status(&self) -> Result<BlockchainStatus, BlockError> {
        let latest = self.get_latest_block().await?;
        let now = Utc::now();
        let last_block_time = latest.as_ref().map(|b| b.timestamp);
        let seconds_since = last_block_time.map(|t| (now - t).num_seconds());
        let state = self.state.read().expect("chain state lock").clone();
        Ok(BlockchainStatus {
            is_synced: seconds_since.is_some_and(|s| s < BLOCK_TIME_SECONDS * 3),
            current_height: state.current_height,
            latest_block_hash: state.latest_block_hash,
            last_block_time,
            seconds_since_last_block: seconds_since,
            cache_size: self.cache.lock().expect("block cache lock").len(),
        })
    }

    /// Revalidates every stored block in `[start_height, end_height]`.
    pub async fn verify_chain_integrity(
        &self,
        start_height: u64,
        end_height: Option<u64>,
    ) -> Result<ChainIntegrityReport, BlockError> {
        let end = end_height.unwrap_or_else(|| self.current_height());
        let mut report = ChainIntegrityReport {
            is_valid: true,
            blocks_checked: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            start_height,
            end_height: end,
        };

        for height in start_height..=end {
            let Some(block) = self.get_block_by_height(height).await? else {
                report.errors.push(format!("Missing block at height {height}"));
                continue;
            };
            let validation = self.validate_block(&block).await?;
            report
                .errors
                .extend(validation.errors.into_iter().map(|e| format!("Height {height}: {e}")));
            report
                .warnings
                .extend(validation.warnings.into_iter().map(|w| format!("Height {height}: {w}")));
            report.blocks_checked += 1;
        }
        report.is_valid = report.errors.is_empty();
        Ok(report)
    }
}

fn strip_id(mut doc: serde_json::Value) -> serde_json::Value {
    if let Some(map) = doc.as_object_mut() {
        map.remove("_id");
    }
    doc
}

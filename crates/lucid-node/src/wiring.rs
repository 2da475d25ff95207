//! Component wiring.
//!
//! Builds the dependency graph bottom-up: store at the base, the chain
//! client and TRON client as sibling leaves, services on top. The payout
//! router shares only the store with the chain core.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use lucid_anchor::AnchorService;
use lucid_blocks::BlockManager;
use lucid_consensus::PoOTConsensusEngine;
use lucid_crypto::hashing::blake3_hash;
use lucid_mempool::TransactionProcessor;
use lucid_onchain::{HttpOnChainClient, OnChainConfig};
use lucid_payouts::{HttpTronClient, PayoutRouter, TronConfig};
use lucid_sessions::{
    MerkleTreeBuilder, SessionChunker, SessionEncryptor, SessionOrchestrator,
};
use lucid_store::{Collection, DocumentStore, FileDocumentStore, MemoryDocumentStore};
use lucid_sync::ChainSynchronizer;
use lucid_telemetry::metrics;
use lucid_types::{CancelHandle, CancelToken};

use crate::config::Config;

/// Sweep cadence for confirmations and mempool expiry.
const SWEEP_INTERVAL_SECS: u64 = 30;

/// Payout batch trigger cadence.
const PAYOUT_INTERVAL_SECS: u64 = 300;

/// Fully wired node.
pub struct Container {
    pub store: Arc<dyn DocumentStore>,
    pub block_manager: Arc<BlockManager>,
    pub transaction_processor: Arc<TransactionProcessor>,
    pub consensus: Arc<PoOTConsensusEngine>,
    pub anchor_service: Arc<AnchorService<HttpOnChainClient>>,
    pub orchestrator: Arc<SessionOrchestrator<AnchorService<HttpOnChainClient>>>,
    pub synchronizer: Option<Arc<ChainSynchronizer>>,
    pub payout_router: Option<Arc<PayoutRouter<HttpTronClient>>>,
    cancel_handle: CancelHandle,
    cancel_token: CancelToken,
}

impl Container {
    /// Builds and initializes every component. The only side effects before
    /// this call are reading the environment and installing telemetry.
    pub async fn initialize(config: &Config) -> anyhow::Result<Container> {
        // A remote document-store cluster (MONGO_URL) would be dialed here;
        // the shipped adapters are the locked file store for deployments and
        // the in-memory store for ephemeral runs.
        let store: Arc<dyn DocumentStore> = if config.production || config.store.url.is_some() {
            Arc::new(FileDocumentStore::open(
                config.pipeline.data_dir.join(&config.store.db),
            )?)
        } else {
            Arc::new(MemoryDocumentStore::new())
        };

        let block_manager = Arc::new(BlockManager::new(
            Arc::clone(&store),
            Some(config.block_storage_path.clone()),
        ));
        block_manager.initialize().await?;

        let transaction_processor = Arc::new(TransactionProcessor::new(Arc::clone(&store)));
        transaction_processor.initialize().await?;

        // The VRF seed is shared cluster-wide; derive it from the genesis
        // hash so every node agrees without extra coordination.
        let genesis_hash = block_manager
            .get_block_by_height(0)
            .await?
            .map(|b| b.hash)
            .unwrap_or_default();
        let vrf_seed = blake3_hash(genesis_hash.as_bytes());
        let consensus = Arc::new(PoOTConsensusEngine::new(Arc::clone(&store), vrf_seed));
        consensus.initialize().await?;

        let onchain = Arc::new(HttpOnChainClient::new(OnChainConfig {
            rpc_url: config.onchain.rpc_url.clone(),
            anchors_address: config.onchain.anchors_address.clone(),
            chunk_store_address: config.onchain.chunk_store_address.clone(),
            gas_limit: config.onchain.gas_limit,
            timeout: Duration::from_secs(20),
        })?);

        let anchor_service = Arc::new(AnchorService::new(onchain, Arc::clone(&store)));
        anchor_service.initialize().await?;

        let session_config = config.pipeline.session_config();
        let orchestrator = Arc::new(SessionOrchestrator::new(
            SessionChunker::new(&session_config),
            Arc::new(SessionEncryptor::new(&session_config, None)),
            MerkleTreeBuilder::new(&session_config),
            Arc::clone(&anchor_service),
            Collection::new(Arc::clone(&store), lucid_sessions::orchestrator::PIPELINE_STATES),
        ));
        orchestrator.initialize().await?;

        let synchronizer = match &config.sync_engine_url {
            Some(url) => Some(Arc::new(ChainSynchronizer::new(
                Arc::clone(&block_manager),
                url.clone(),
                None,
            )?)),
            None => None,
        };

        let payout_router = match &config.tron {
            Some(tron) => {
                let client = Arc::new(HttpTronClient::new(TronConfig {
                    network: tron.network,
                    private_key_hex: tron.private_key_hex.clone(),
                    router_v0_address: tron.router_v0_address.clone(),
                    router_kyc_address: tron.router_kyc_address.clone(),
                    timeout: Duration::from_secs(20),
                })?);
                let router = Arc::new(PayoutRouter::new(client, Arc::clone(&store)));
                router.initialize().await?;
                Some(router)
            }
            None => None,
        };

        let (cancel_handle, cancel_token) = CancelHandle::new();
        info!("node container initialized");
        Ok(Container {
            store,
            block_manager,
            transaction_processor,
            consensus,
            anchor_service,
            orchestrator,
            synchronizer,
            payout_router,
            cancel_handle,
            cancel_token,
        })
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel_token.clone()
    }

    /// Signals every background loop to stop.
    pub fn shutdown(&self) {
        self.cancel_handle.cancel();
    }

    /// Spawns the background loops and returns their join handles.
    pub fn spawn_background_loops(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        // Consensus slot loop.
        {
            let consensus = Arc::clone(&self.consensus);
            let cancel = self.cancel_token();
            let genesis = Utc::now();
            handles.push(tokio::spawn(async move {
                if let Err(e) = consensus.slot_loop(genesis, cancel).await {
                    warn!(error = %e, "slot loop terminated");
                }
            }));
        }

        // Anchor confirmation sweep and mempool housekeeping.
        {
            let anchor = Arc::clone(&self.anchor_service);
            let mempool = Arc::clone(&self.transaction_processor);
            let cancel = self.cancel_token();
            handles.push(tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
                loop {
                    ticker.tick().await;
                    if cancel.is_cancelled() {
                        return;
                    }
                    match anchor.check_anchor_confirmations().await {
                        Ok(settled) if settled > 0 => {
                            metrics::ANCHORS_CONFIRMED.inc_by(settled);
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "confirmation sweep failed"),
                    }
                    if let Err(e) = mempool.expire_stale().await {
                        warn!(error = %e, "mempool expiry failed");
                    }
                    metrics::MEMPOOL_SIZE.set(mempool.mempool_info().size as i64);
                }
            }));
        }

        // Payout batch trigger (isolated loop).
        if let Some(router) = &self.payout_router {
            let router = Arc::clone(router);
            let cancel = self.cancel_token();
            handles.push(tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(Duration::from_secs(PAYOUT_INTERVAL_SECS));
                loop {
                    ticker.tick().await;
                    if cancel.is_cancelled() {
                        return;
                    }
                    match router.process_pending_payouts().await {
                        Ok(count) if count > 0 => {
                            metrics::PAYOUT_BATCHES_SUBMITTED.inc();
                            info!(count, "payouts processed");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "payout processing failed"),
                    }
                }
            }));
        }

        // Chain synchronizer.
        if let Some(sync) = &self.synchronizer {
            let sync = Arc::clone(sync);
            let cancel = self.cancel_token();
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
                loop {
                    ticker.tick().await;
                    if cancel.is_cancelled() {
                        return;
                    }
                    match sync.synchronize(cancel.clone()).await {
                        Ok(report) if report.synced_blocks > 0 => {
                            metrics::BLOCKS_STORED.inc_by(report.synced_blocks);
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "synchronization failed"),
                    }
                }
            }));
        }

        handles
    }
}

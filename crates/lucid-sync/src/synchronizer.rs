//! Chain synchronizer.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use lucid_blocks::{BlockError, BlockManager};
use lucid_types::{Block, CancelToken, CoreErrorKind, ErrorKind};

/// Default HTTP timeout for remote queries.
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 30;

/// Errors surfaced by the synchronizer.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote chain unreachable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote returned malformed data: {0}")]
    MalformedRemote(String),

    #[error("Synchronization canceled")]
    Canceled,

    #[error(transparent)]
    Block(#[from] BlockError),
}

impl CoreErrorKind for SyncError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteUnavailable(_) => ErrorKind::ChainUnavailable,
            Self::MalformedRemote(_) => ErrorKind::Validation,
            Self::Canceled => ErrorKind::PipelineCanceled,
            Self::Block(e) => e.kind(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::RemoteUnavailable(e.to_string())
    }
}

/// Tip state reported by the remote engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChainState {
    pub chain_height: u64,
    pub latest_block_hash: String,
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub synchronized: bool,
    pub local_height: u64,
    pub remote_height: u64,
    pub synced_blocks: u64,
    pub message: Option<String>,
}

/// Pulls remote state and applies missing blocks locally.
pub struct ChainSynchronizer {
    block_manager: Arc<BlockManager>,
    http: reqwest::Client,
    engine_url: String,
}

impl ChainSynchronizer {
    pub fn new(
        block_manager: Arc<BlockManager>,
        engine_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS)))
            .build()
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        Ok(Self {
            block_manager,
            http,
            engine_url: engine_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn remote_state(&self) -> Result<RemoteChainState, SyncError> {
        let url = format!("{}/blockchain/status", self.engine_url);
        let response = self.http.get(&url).send().await?;
        response
            .json::<RemoteChainState>()
            .await
            .map_err(|e| SyncError::MalformedRemote(e.to_string()))
    }

    async fn remote_block(&self, height: u64) -> Result<Block, SyncError> {
        let url = format!("{}/blockchain/blocks/{height}", self.engine_url);
        let response = self.http.get(&url).send().await?;
        response
            .json::<Block>()
            .await
            .map_err(|e| SyncError::MalformedRemote(e.to_string()))
    }

    /// Runs one synchronization pass.
    ///
    /// Missing blocks are fetched sequentially from `local + 1` up to the
    /// remote height; each one is validated by the block manager before it
    /// is applied. When the local chain is ahead, or the tips diverge at
    /// equal height, the report carries `synchronized = false` and nothing
    /// is rolled back.
    pub async fn synchronize(&self, cancel: CancelToken) -> Result<SyncReport, SyncError> {
        let local_height = self.block_manager.current_height();
        let local_hash = self.block_manager.latest_block_hash();

        let remote = self.remote_state().await?;
        info!(
            local_height,
            remote_height = remote.chain_height,
            "chain synchronization started"
        );

        if remote.chain_height == local_height {
            let synchronized = remote.latest_block_hash == local_hash;
            if !synchronized {
                warn!(height = local_height, "tip hash divergence, not rolling back");
            }
            return Ok(SyncReport {
                success: true,
                synchronized,
                local_height,
                remote_height: remote.chain_height,
                synced_blocks: 0,
                message: (!synchronized).then(|| "tip hash mismatch".to_string()),
            });
        }

        if remote.chain_height < local_height {
            return Ok(SyncReport {
                success: true,
                synchronized: false,
                local_height,
                remote_height: remote.chain_height,
                synced_blocks: 0,
                message: Some("local chain is ahead of remote".to_string()),
            });
        }

        let mut synced_blocks = 0;
        for height in (local_height + 1)..=remote.chain_height {
            if cancel.is_cancelled() {
                return Err(SyncError::Canceled);
            }
            let block = self.remote_block(height).await?;
            if self.block_manager.add_block(&block).await? {
                synced_blocks += 1;
            }
        }

        info!(synced_blocks, new_height = self.block_manager.current_height(), "backfill complete");
        Ok(SyncReport {
            success: true,
            synchronized: true,
            local_height,
            remote_height: remote.chain_height,
            synced_blocks,
            message: None,
        })
    }
}

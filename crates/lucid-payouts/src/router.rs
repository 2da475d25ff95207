//! Payout router service.
//!
//! Owns the `payouts` and `payout_batches` collections. Requests are
//! validated (and KYC-gated) at creation time; a scheduled trigger drains
//! the pending set into batches of at most fifty, grouped by router type,
//! and submits each batch as one on-chain disbursement. A batch is atomic
//! with respect to status: every member inherits the batch outcome.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use lucid_store::{
    Collection, DocumentStore, Filter, FindOptions, GroupStats, IndexSpec, SortOrder,
};

use crate::entities::{
    is_tron_address, PayoutBatch, PayoutContext, PayoutRequest, PayoutStatus, RouterType,
    DEFAULT_BATCH_SIZE, MAX_PAYOUT_USDT, MIN_PAYOUT_USDT,
};
use crate::error::PayoutError;
use crate::ports::{Trc20Transfer, TronRpc, TronTxState};
use crate::tron::DEFAULT_FEE_LIMIT_SUN;

pub const PAYOUTS: &str = "payouts";
pub const PAYOUT_BATCHES: &str = "payout_batches";

/// Fraction of available energy a batch may claim before the guardrail
/// trips.
const ENERGY_HEADROOM: f64 = 0.9;

/// Aggregate router statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RouterStats {
    pub total_payouts: u64,
    pub by_status: HashMap<String, u64>,
    pub amount_by_status: HashMap<String, f64>,
    pub is_processing: bool,
}

/// USDT-TRC20 payout router over a required TRON client.
pub struct PayoutRouter<T: TronRpc> {
    tron: Arc<T>,
    payouts: Collection<PayoutRequest>,
    batches: Collection<PayoutBatch>,
    batch_size: usize,
    fee_limit_sun: u64,
    /// Single-flight guard: only one batch run per instance.
    is_processing: AtomicBool,
}

impl<T: TronRpc> PayoutRouter<T> {
    pub fn new(tron: Arc<T>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            tron,
            payouts: Collection::new(Arc::clone(&store), PAYOUTS),
            batches: Collection::new(store, PAYOUT_BATCHES),
            batch_size: DEFAULT_BATCH_SIZE,
            fee_limit_sun: DEFAULT_FEE_LIMIT_SUN,
            is_processing: AtomicBool::new(false),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Declares indexes; call once at startup.
    pub async fn initialize(&self) -> Result<(), PayoutError> {
        self.payouts
            .ensure_index(IndexSpec::plain(&["recipient_address"]))
            .await?;
        self.payouts.ensure_index(IndexSpec::plain(&["status"])).await?;
        self.payouts.ensure_index(IndexSpec::plain(&["created_at"])).await?;
        self.payouts.ensure_index(IndexSpec::plain(&["router_type"])).await?;
        self.batches.ensure_index(IndexSpec::plain(&["status"])).await?;
        self.batches.ensure_index(IndexSpec::plain(&["created_at"])).await?;
        Ok(())
    }

    /// Creates a payout request.
    ///
    /// Validation happens here, not at batch time: a KYC-gated request
    /// without compliance material never enters the pending set.
    pub async fn create_payout(
        &self,
        recipient_address: &str,
        amount_usdt: f64,
        router_type: RouterType,
        reason_code: &str,
        kyc_hash: Option<String>,
        compliance_sig: Option<String>,
        context: PayoutContext,
    ) -> Result<String, PayoutError> {
        if !is_tron_address(recipient_address) {
            return Err(PayoutError::InvalidAddress(recipient_address.to_string()));
        }
        if !(MIN_PAYOUT_USDT..=MAX_PAYOUT_USDT).contains(&amount_usdt) {
            return Err(PayoutError::AmountOutOfRange {
                amount: amount_usdt,
                min: MIN_PAYOUT_USDT,
                max: MAX_PAYOUT_USDT,
            });
        }
        if router_type == RouterType::KycGated {
            let hash_ok = kyc_hash.as_deref().is_some_and(|h| !h.is_empty());
            let sig_ok = compliance_sig.as_deref().is_some_and(|s| !s.is_empty());
            if !hash_ok || !sig_ok {
                return Err(PayoutError::KycRejected {
                    recipient: recipient_address.to_string(),
                    reason: "missing or empty compliance material".into(),
                });
            }
        }

        let payout_id = format!("payout_{}", uuid::Uuid::new_v4());
        let request = PayoutRequest {
            payout_id: payout_id.clone(),
            recipient_address: recipient_address.to_string(),
            amount_usdt,
            router_type,
            reason_code: reason_code.to_string(),
            kyc_hash,
            compliance_sig,
            context,
            created_at: Utc::now(),
            status: PayoutStatus::Pending,
            processed_at: None,
            txid: None,
            error: None,
        };
        self.payouts.insert(&payout_id, &request).await?;

        info!(%payout_id, amount_usdt, ?router_type, "payout created");
        Ok(payout_id)
    }

    pub async fn get_payout(&self, payout_id: &str) -> Result<PayoutRequest, PayoutError> {
        self.payouts
            .get(payout_id)
            .await?
            .ok_or_else(|| PayoutError::NotFound(payout_id.to_string()))
    }

    /// Payouts for one recipient, most recent first.
    pub async fn get_payouts_by_address(
        &self,
        recipient_address: &str,
        limit: usize,
    ) -> Result<Vec<PayoutRequest>, PayoutError> {
        Ok(self
            .payouts
            .find(
                Filter::eq("recipient_address", recipient_address),
                FindOptions::sorted_by("created_at", SortOrder::Descending).with_limit(limit),
            )
            .await?)
    }

    /// Cancels a payout that has not started processing.
    pub async fn cancel_payout(&self, payout_id: &str) -> Result<(), PayoutError> {
        let payout = self.get_payout(payout_id).await?;
        if payout.status != PayoutStatus::Pending {
            return Err(PayoutError::InvalidState {
                payout_id: payout_id.to_string(),
                status: payout.status.as_str().to_string(),
                action: "cancel",
            });
        }
        self.payouts
            .update(
                Filter::eq("payout_id", payout_id),
                json!({"status": PayoutStatus::Cancelled.as_str(), "processed_at": Utc::now()}),
            )
            .await?;
        Ok(())
    }

    /// Drains the pending set into batches and submits them.
    ///
    /// Only one run is active per instance; a second caller is a no-op
    /// returning zero. Returns the number of payouts that completed.
    pub async fn process_pending_payouts(&self) -> Result<u64, PayoutError> {
        if self
            .is_processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(0);
        }

        let result = self.drain_pending().await;
        self.is_processing.store(false, Ordering::Release);
        result
    }

    async fn drain_pending(&self) -> Result<u64, PayoutError> {
        let pending = self
            .payouts
            .find(
                Filter::eq("status", "pending"),
                FindOptions::sorted_by("created_at", SortOrder::Ascending),
            )
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }

        // Group by router type, then cut into size-capped batches.
        let mut by_router: HashMap<RouterType, Vec<PayoutRequest>> = HashMap::new();
        for request in pending {
            by_router.entry(request.router_type).or_default().push(request);
        }

        let mut completed = 0;
        for (router, requests) in by_router {
            for group in requests.chunks(self.batch_size) {
                match self.submit_batch(router, group).await {
                    Ok(count) => completed += count,
                    Err(e) => {
                        // Batch-level failure is already persisted on every
                        // member; keep draining the rest.
                        warn!(?router, error = %e, "payout batch failed");
                    }
                }
            }
        }
        Ok(completed)
    }

    async fn submit_batch(
        &self,
        router: RouterType,
        requests: &[PayoutRequest],
    ) -> Result<u64, PayoutError> {
        let batch_id = format!("batch_{}", uuid::Uuid::new_v4());
        let payout_ids: Vec<String> = requests.iter().map(|r| r.payout_id.clone()).collect();
        let total: f64 = requests.iter().map(|r| r.amount_usdt).sum();

        let mut batch = PayoutBatch {
            batch_id: batch_id.clone(),
            router_type: router,
            payout_ids: payout_ids.clone(),
            total_amount_usdt: total,
            created_at: Utc::now(),
            processed_at: None,
            txid: None,
            status: PayoutStatus::Processing,
        };
        self.batches.insert(&batch_id, &batch).await?;
        self.set_payout_status(&payout_ids, PayoutStatus::Processing, None, None)
            .await?;

        // Resource guardrail before touching the network with a transfer.
        let required = self.tron.estimated_energy(requests.len());
        match self.tron.account_resources().await {
            Ok(resources) => {
                let budget = (resources.energy_available as f64 * ENERGY_HEADROOM) as u64;
                if required > budget {
                    let err = PayoutError::InsufficientEnergy {
                        required,
                        available: resources.energy_available,
                    };
                    self.fail_batch(&mut batch, &err.to_string()).await?;
                    return Err(err);
                }
            }
            Err(e) => {
                self.fail_batch(&mut batch, &e.to_string()).await?;
                return Err(e);
            }
        }

        let transfers: Vec<Trc20Transfer> = requests
            .iter()
            .map(|r| Trc20Transfer {
                to: r.recipient_address.clone(),
                amount_micro: r.amount_micro(),
            })
            .collect();

        match self
            .tron
            .send_batch_transfer(router, &transfers, self.fee_limit_sun)
            .await
        {
            Ok(txid) => {
                let processed_at = Utc::now();
                batch.status = PayoutStatus::Completed;
                batch.txid = Some(txid.clone());
                batch.processed_at = Some(processed_at);
                self.batches.upsert(&batch_id, &batch).await?;
                self.set_payout_status(
                    &payout_ids,
                    PayoutStatus::Completed,
                    Some(&txid),
                    None,
                )
                .await?;
                info!(%batch_id, %txid, count = payout_ids.len(), "payout batch completed");
                Ok(payout_ids.len() as u64)
            }
            Err(e) => {
                self.fail_batch(&mut batch, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn fail_batch(
        &self,
        batch: &mut PayoutBatch,
        error: &str,
    ) -> Result<(), PayoutError> {
        batch.status = PayoutStatus::Failed;
        batch.processed_at = Some(Utc::now());
        self.batches.upsert(&batch.batch_id, batch).await?;
        self.set_payout_status(&batch.payout_ids, PayoutStatus::Failed, None, Some(error))
            .await?;
        Ok(())
    }

    async fn set_payout_status(
        &self,
        payout_ids: &[String],
        status: PayoutStatus,
        txid: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), PayoutError> {
        let ids: Vec<serde_json::Value> = payout_ids.iter().map(|id| json!(id)).collect();
        let mut set = json!({"status": status.as_str()});
        if matches!(
            status,
            PayoutStatus::Completed | PayoutStatus::Failed | PayoutStatus::Cancelled
        ) {
            set["processed_at"] = json!(Utc::now());
        }
        if let Some(txid) = txid {
            set["txid"] = json!(txid);
        }
        if let Some(error) = error {
            set["error"] = json!(error);
        }
        self.payouts
            .update(Filter::In("payout_id".into(), ids), set)
            .await?;
        Ok(())
    }

    /// Polls the payment chain for a completed payout's transaction.
    pub async fn check_payout_status(&self, payout_id: &str) -> Result<TronTxState, PayoutError> {
        let payout = self.get_payout(payout_id).await?;
        match payout.txid {
            Some(txid) => self.tron.transaction_state(&txid).await,
            None => Ok(TronTxState::Pending),
        }
    }

    /// Aggregate router statistics.
    pub async fn router_stats(&self) -> Result<RouterStats, PayoutError> {
        let groups: HashMap<String, GroupStats> = self
            .payouts
            .store()
            .group_stats(PAYOUTS, Filter::All, "status", Some("amount_usdt"))
            .await?;
        Ok(RouterStats {
            total_payouts: groups.values().map(|g| g.count).sum(),
            by_status: groups.iter().map(|(k, v)| (k.clone(), v.count)).collect(),
            amount_by_status: groups.iter().map(|(k, v)| (k.clone(), v.sum)).collect(),
            is_processing: self.is_processing.load(Ordering::Acquire),
        })
    }
}

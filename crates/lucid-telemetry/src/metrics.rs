//! Prometheus metric families.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    /// Process-wide registry; the node exposes it on the metrics port.
    pub static ref REGISTRY: Registry = Registry::new();

    // Chain core
    pub static ref BLOCKS_STORED: IntCounter =
        IntCounter::new("lucid_blocks_stored_total", "Blocks accepted into the chain").unwrap();
    pub static ref TRANSACTIONS_ADMITTED: IntCounter = IntCounter::new(
        "lucid_transactions_admitted_total",
        "Transactions admitted to the mempool"
    )
    .unwrap();
    pub static ref TRANSACTIONS_EVICTED: IntCounter = IntCounter::new(
        "lucid_transactions_evicted_total",
        "Transactions evicted from the mempool"
    )
    .unwrap();
    pub static ref MEMPOOL_SIZE: IntGauge =
        IntGauge::new("lucid_mempool_size", "Transactions currently pooled").unwrap();

    // Consensus
    pub static ref SLOTS_RUN: IntCounter =
        IntCounter::new("lucid_slots_run_total", "Consensus slots executed").unwrap();
    pub static ref SLOTS_SKIPPED: IntCounter = IntCounter::new(
        "lucid_slots_skipped_total",
        "Slots with no eligible primary and no fallbacks"
    )
    .unwrap();

    // Sessions and anchoring
    pub static ref PIPELINES_COMPLETED: IntCounter = IntCounter::new(
        "lucid_pipelines_completed_total",
        "Session pipelines completed"
    )
    .unwrap();
    pub static ref PIPELINES_FAILED: IntCounter =
        IntCounter::new("lucid_pipelines_failed_total", "Session pipelines failed").unwrap();
    pub static ref ANCHORS_SUBMITTED: IntCounter = IntCounter::new(
        "lucid_anchors_submitted_total",
        "Session anchors submitted to the primary chain"
    )
    .unwrap();
    pub static ref ANCHORS_CONFIRMED: IntCounter = IntCounter::new(
        "lucid_anchors_confirmed_total",
        "Session anchors confirmed on the primary chain"
    )
    .unwrap();

    // Payouts (isolated chain)
    pub static ref PAYOUT_BATCHES_SUBMITTED: IntCounter = IntCounter::new(
        "lucid_payout_batches_submitted_total",
        "Payout batches submitted to TRON"
    )
    .unwrap();
}

/// Registers every family with the process registry. Idempotent enough for
/// tests: re-registration errors are ignored.
pub fn register_metrics() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BLOCKS_STORED.clone()),
        Box::new(TRANSACTIONS_ADMITTED.clone()),
        Box::new(TRANSACTIONS_EVICTED.clone()),
        Box::new(MEMPOOL_SIZE.clone()),
        Box::new(SLOTS_RUN.clone()),
        Box::new(SLOTS_SKIPPED.clone()),
        Box::new(PIPELINES_COMPLETED.clone()),
        Box::new(PIPELINES_FAILED.clone()),
        Box::new(ANCHORS_SUBMITTED.clone()),
        Box::new(ANCHORS_CONFIRMED.clone()),
        Box::new(PAYOUT_BATCHES_SUBMITTED.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) => {}
            Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Renders the registry in the Prometheus text exposition format.
pub fn gather() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&REGISTRY.gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

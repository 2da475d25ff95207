//! PoOT consensus engine.
//!
//! Owns the `work_tally` and `leader_schedule` collections. The cooldown
//! set is always derived from persisted schedules; an in-memory copy would
//! only be an optimization and is deliberately absent.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use lucid_store::{DocumentStore, Filter, FindOptions, IndexSpec, SortOrder};
use lucid_types::{CancelToken, LeaderSchedule, TaskProof, WorkCredit};

use crate::credits::tally_work_credits;
use crate::error::ConsensusError;
use crate::ledger::WorkLedger;
use crate::params::{
    COOLDOWN_SLOTS, LEADER_WINDOW_SLOTS, SLOT_DURATION_SEC, SLOT_TIMEOUT_MS,
};
use crate::selection::select_leader;

const WORK_TALLY: &str = "work_tally";
const LEADER_SCHEDULE: &str = "leader_schedule";

/// Work-credit tally and leader election over the shared store.
pub struct PoOTConsensusEngine {
    store: Arc<dyn DocumentStore>,
    ledger: WorkLedger,
    vrf_seed: [u8; 32],
}

impl PoOTConsensusEngine {
    pub fn new(store: Arc<dyn DocumentStore>, vrf_seed: [u8; 32]) -> Self {
        Self {
            ledger: WorkLedger::new(Arc::clone(&store)),
            store,
            vrf_seed,
        }
    }

    /// Declares indexes for the collections this engine owns.
    pub async fn initialize(&self) -> Result<(), ConsensusError> {
        self.ledger.initialize().await?;
        self.store
            .ensure_index(WORK_TALLY, IndexSpec::unique(&["entity_id"]))
            .await?;
        self.store
            .ensure_index(LEADER_SCHEDULE, IndexSpec::unique(&["slot"]))
            .await?;
        Ok(())
    }

    /// The ledger this engine tallies from.
    pub fn ledger(&self) -> &WorkLedger {
        &self.ledger
    }

    /// Validates and records one task proof.
    pub async fn submit_task_proof(&self, proof: &TaskProof) -> Result<(), ConsensusError> {
        self.ledger.append(proof).await
    }

    /// Slot number for a wall-clock instant relative to chain genesis time.
    pub fn slot_for(genesis: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - genesis).num_seconds().max(0) as u64;
        elapsed / SLOT_DURATION_SEC
    }

    /// Tallies work credits over the sliding window ending at `end_slot`
    /// and persists the ranking. Returns the ranked credits.
    pub async fn calculate_work_credits(
        &self,
        end_slot: u64,
    ) -> Result<Vec<WorkCredit>, ConsensusError> {
        let start_slot = end_slot.saturating_sub(LEADER_WINDOW_SLOTS.saturating_sub(1));
        self.calculate_work_credits_in(start_slot, end_slot).await
    }

    /// Tally over an explicit window, used by tests and replays.
    pub async fn calculate_work_credits_in(
        &self,
        start_slot: u64,
        end_slot: u64,
    ) -> Result<Vec<WorkCredit>, ConsensusError> {
        let proofs = self.ledger.proofs_in_window(start_slot, end_slot).await?;
        let window = end_slot - start_slot + 1;
        let credits = tally_work_credits(&proofs, window);

        // Replace the tally wholesale; ranks shift between runs.
        self.store.delete(WORK_TALLY, Filter::All).await?;
        for credit in &credits {
            let mut doc = serde_json::to_value(credit)?;
            doc["_id"] = json!(credit.entity_id);
            self.store.insert(WORK_TALLY, doc).await?;
        }

        info!(
            entities = credits.len(),
            start_slot, end_slot, "work credits tallied"
        );
        Ok(credits)
    }

    /// Current persisted ranking, best first.
    pub async fn current_ranking(&self) -> Result<Vec<WorkCredit>, ConsensusError> {
        let docs = self
            .store
            .find(
                WORK_TALLY,
                Filter::All,
                FindOptions::sorted_by("rank", SortOrder::Ascending),
            )
            .await?;
        let mut ranking = Vec::with_capacity(docs.len());
        for mut doc in docs {
            if let Some(map) = doc.as_object_mut() {
                map.remove("_id");
            }
            ranking.push(serde_json::from_value(doc)?);
        }
        Ok(ranking)
    }

    /// Entities that held a primary slot within the cooldown window before
    /// `slot`, derived from the persisted schedules.
    pub async fn entities_in_cooldown(&self, slot: u64) -> Result<HashSet<String>, ConsensusError> {
        let window_start = slot.saturating_sub(COOLDOWN_SLOTS);
        let docs = self
            .store
            .find(
                LEADER_SCHEDULE,
                Filter::And(vec![
                    Filter::Gte("slot".into(), json!(window_start)),
                    Filter::Lt("slot".into(), json!(slot)),
                ]),
                FindOptions::default(),
            )
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| doc["primary"].as_str().map(str::to_string))
            .collect())
    }

    /// Elects the leader for one slot and persists the schedule.
    pub async fn select_leader(&self, slot: u64) -> Result<LeaderSchedule, ConsensusError> {
        let ranking = self.current_ranking().await?;
        let cooling = self.entities_in_cooldown(slot).await?;
        let schedule = select_leader(slot, &ranking, &cooling, &self.vrf_seed);

        let mut doc = serde_json::to_value(&schedule)?;
        doc["_id"] = json!(slot.to_string());
        match self.store.insert(LEADER_SCHEDULE, doc).await {
            Ok(()) => {}
            Err(lucid_store::StoreError::DuplicateKey { .. }) => {
                return Err(ConsensusError::SlotAlreadyScheduled(slot));
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            slot,
            primary = schedule.primary.as_deref().unwrap_or("<none>"),
            reason = ?schedule.result.reason,
            "leader selected"
        );
        Ok(schedule)
    }

    /// Persisted schedule for one slot.
    pub async fn schedule_for(&self, slot: u64) -> Result<Option<LeaderSchedule>, ConsensusError> {
        Ok(self
            .store
            .get(LEADER_SCHEDULE, &slot.to_string())
            .await?
            .map(|mut doc| {
                doc.as_object_mut().map(|m| m.remove("_id"));
                serde_json::from_value(doc)
            })
            .transpose()?)
    }

    /// Runs one slot under the selection deadline. On timeout the caller is
    /// expected to produce under the previous schedule's first fallback.
    pub async fn run_slot(&self, slot: u64) -> Result<LeaderSchedule, ConsensusError> {
        match tokio::time::timeout(
            Duration::from_millis(SLOT_TIMEOUT_MS),
            self.select_leader(slot),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(slot, "leader selection timed out");
                Err(ConsensusError::SlotTimeout(slot))
            }
        }
    }

    /// Slot loop: tallies credits and elects once per slot until canceled.
    /// Intended to be spawned by the node runtime.
    pub async fn slot_loop(
        &self,
        genesis: DateTime<Utc>,
        cancel: CancelToken,
    ) -> Result<(), ConsensusError> {
        let mut ticker = tokio::time::interval(Duration::from_secs(SLOT_DURATION_SEC));
        loop {
            ticker.tick().await;
            if cancel.is_cancelled() {
                return Ok(());
            }
            let slot = Self::slot_for(genesis, Utc::now());
            self.calculate_work_credits(slot).await?;
            match self.run_slot(slot).await {
                Ok(schedule) if schedule.primary.is_none() && schedule.fallbacks.is_empty() => {
                    warn!(slot, "slot skipped: no primary and no fallbacks");
                }
                Ok(_) => {}
                Err(ConsensusError::SlotAlreadyScheduled(_)) => {}
                Err(ConsensusError::SlotTimeout(_)) => {
                    // Block production falls through to the previous
                    // schedule's first fallback; nothing to persist here.
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucid_store::MemoryDocumentStore;
    use lucid_types::SelectionReason;

    async fn engine() -> PoOTConsensusEngine {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let e = PoOTConsensusEngine::new(store, [7u8; 32]);
        e.initialize().await.unwrap();
        e
    }

    async fn seed_tally(e: &PoOTConsensusEngine, entries: &[(&str, u64, f64)]) {
        for (i, (entity, credits, live)) in entries.iter().enumerate() {
            let credit = WorkCredit {
                entity_id: entity.to_string(),
                credits: *credits,
                live_score: *live,
                rank: i as u32 + 1,
            };
            let mut doc = serde_json::to_value(&credit).unwrap();
            doc["_id"] = json!(credit.entity_id);
            e.store.insert(WORK_TALLY, doc).await.unwrap();
        }
    }

    #[tokio::test]
    async fn cooldown_bans_reelection_for_sixteen_slots() {
        let e = engine().await;
        seed_tally(
            &e,
            &[
                ("node_001", 1000, 0.95),
                ("node_002", 500, 0.90),
                ("node_003", 250, 0.85),
            ],
        )
        .await;

        let mut primaries = Vec::new();
        for slot in 1000..1020 {
            let schedule = e.select_leader(slot).await.unwrap();
            primaries.push((slot, schedule.primary.clone()));
        }

        // Slot 1000 goes to the strongest entity; it is banned for the
        // next sixteen slots and eligible again at 1017.
        assert_eq!(primaries[0].1.as_deref(), Some("node_001"));
        for (slot, primary) in &primaries[1..17] {
            assert_ne!(
                primary.as_deref(),
                Some("node_001"),
                "node_001 must be cooling down at slot {slot}"
            );
        }
        assert_eq!(primaries[17].1.as_deref(), Some("node_001")); // slot 1017
        assert!(primaries
            .iter()
            .any(|(_, p)| p.as_deref() == Some("node_002")));

        // No primary repeats within its cooldown window.
        for (i, (slot, primary)) in primaries.iter().enumerate() {
            let Some(primary) = primary else { continue };
            let window_start = slot.saturating_sub(COOLDOWN_SLOTS);
            for (prev_slot, prev_primary) in &primaries[..i] {
                if *prev_slot >= window_start {
                    assert_ne!(
                        prev_primary.as_ref(),
                        Some(primary),
                        "{primary} re-elected at {slot} within cooldown"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn small_cluster_saturates_into_fallback_slots() {
        let e = engine().await;
        seed_tally(&e, &[("n1", 100, 0.9), ("n2", 50, 0.9), ("n3", 25, 0.9)]).await;

        for slot in 0..3 {
            assert!(e.select_leader(slot).await.unwrap().primary.is_some());
        }
        // Three entities cannot cover a sixteen-slot ban: slot 3 has no
        // eligible primary and hands the driver the ranked fallbacks.
        let saturated = e.select_leader(3).await.unwrap();
        assert!(saturated.primary.is_none());
        assert_eq!(saturated.fallbacks, vec!["n1", "n2", "n3"]);
        assert_eq!(saturated.result.reason, SelectionReason::CooldownSkip);
    }

    #[tokio::test]
    async fn density_gate_blocks_low_liveness() {
        let e = engine().await;
        seed_tally(&e, &[("node_001", 100, 0.1)]).await;
        let schedule = e.select_leader(1000).await.unwrap();
        assert!(schedule.primary.is_none());
        assert_eq!(
            schedule.result.reason,
            SelectionReason::DensityThresholdNotMet
        );
    }

    #[tokio::test]
    async fn tally_persists_ranked_credits() {
        let e = engine().await;
        let proof = crate::ledger::tests::signed_proof(
            "node_001",
            1000,
            lucid_types::TaskProofType::ValidationSignature,
            lucid_types::TaskProofValue::ValidatedSessions {
                validated_sessions: 5,
            },
        );
        e.submit_task_proof(&proof).await.unwrap();

        let credits = e.calculate_work_credits_in(1000, 1001).await.unwrap();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].credits, 5);

        let ranking = e.current_ranking().await.unwrap();
        assert_eq!(ranking[0].entity_id, "node_001");
        assert_eq!(ranking[0].rank, 1);
    }

    #[tokio::test]
    async fn slot_is_single_writer() {
        let e = engine().await;
        seed_tally(&e, &[("node_001", 100, 0.9)]).await;
        e.select_leader(42).await.unwrap();
        let err = e.select_leader(42).await.unwrap_err();
        assert!(matches!(err, ConsensusError::SlotAlreadyScheduled(42)));
        assert!(e.schedule_for(42).await.unwrap().is_some());
    }
}

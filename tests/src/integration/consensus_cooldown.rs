//! Leader election over twenty slots with a three-entity cluster.
//!
//! The cooldown is absolute: no entity holds two primary slots within
//! sixteen slots of each other. With only three entities the ban cannot be
//! covered, so most intermediate slots carry a null primary and hand the
//! driver the ranked fallbacks.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use lucid_consensus::{PoOTConsensusEngine, COOLDOWN_SLOTS};
    use lucid_types::{SelectionReason, WorkCredit};

    use crate::helpers::memory_store;

    async fn engine_with_tally(entries: &[(&str, u64, f64)]) -> PoOTConsensusEngine {
        let store = memory_store();
        let engine = PoOTConsensusEngine::new(std::sync::Arc::clone(&store), [7u8; 32]);
        engine.initialize().await.unwrap();
        for (i, (entity, credits, live)) in entries.iter().enumerate() {
            let credit = WorkCredit {
                entity_id: entity.to_string(),
                credits: *credits,
                live_score: *live,
                rank: i as u32 + 1,
            };
            let mut doc = serde_json::to_value(&credit).unwrap();
            doc["_id"] = json!(credit.entity_id);
            store.insert("work_tally", doc).await.unwrap();
        }
        engine
    }

    #[tokio::test]
    async fn twenty_slot_cooldown_run() {
        let engine = engine_with_tally(&[
            ("node_001", 1000, 0.95),
            ("node_002", 500, 0.90),
            ("node_003", 250, 0.85),
        ])
        .await;

        let mut schedules = Vec::new();
        for slot in 1000..1020 {
            schedules.push(engine.select_leader(slot).await.unwrap());
        }

        // The strongest entity opens the run and returns the moment its
        // ban expires.
        assert_eq!(schedules[0].primary.as_deref(), Some("node_001"));
        assert_eq!(schedules[0].result.reason, SelectionReason::HighestCredits);
        for schedule in &schedules[1..17] {
            assert_ne!(
                schedule.primary.as_deref(),
                Some("node_001"),
                "node_001 held slot {} inside its cooldown",
                schedule.slot
            );
        }
        assert_eq!(schedules[17].primary.as_deref(), Some("node_001")); // slot 1017
        assert!(schedules
            .iter()
            .any(|s| s.primary.as_deref() == Some("node_002")));

        // No primary repeats within the cooldown window, ever.
        for (i, schedule) in schedules.iter().enumerate() {
            let Some(primary) = &schedule.primary else {
                continue;
            };
            let window_start = schedule.slot.saturating_sub(COOLDOWN_SLOTS);
            for earlier in &schedules[..i] {
                if earlier.slot >= window_start {
                    assert_ne!(
                        earlier.primary.as_ref(),
                        Some(primary),
                        "{primary} re-elected at slot {} within cooldown",
                        schedule.slot
                    );
                }
            }
        }

        // Saturated slots expose the full ranking as fallbacks so the
        // driver can still produce.
        for schedule in schedules.iter().filter(|s| s.primary.is_none()) {
            assert_eq!(schedule.result.reason, SelectionReason::CooldownSkip);
            assert_eq!(schedule.fallbacks[0], "node_001");
            assert_eq!(schedule.fallbacks.len(), 3);
        }

        // Every schedule was persisted and is replayable.
        for slot in 1000..1020 {
            assert!(engine.schedule_for(slot).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn identical_credits_resolve_by_vrf_deterministically() {
        let engine = engine_with_tally(&[
            ("node_a", 1000, 0.95),
            ("node_b", 1000, 0.95),
            ("node_c", 1000, 0.95),
        ])
        .await;

        let schedule = engine.select_leader(2000).await.unwrap();
        assert_eq!(schedule.result.reason, SelectionReason::VrfTieBreak);
        let winner = schedule.primary.clone().unwrap();

        // Re-running the same slot on a fresh engine with the same seed
        // picks the same winner.
        let replay = engine_with_tally(&[
            ("node_a", 1000, 0.95),
            ("node_b", 1000, 0.95),
            ("node_c", 1000, 0.95),
        ])
        .await;
        let replayed = replay.select_leader(2000).await.unwrap();
        assert_eq!(replayed.primary.as_deref(), Some(winner.as_str()));
    }

    #[tokio::test]
    async fn sparse_liveness_never_elects() {
        let engine = engine_with_tally(&[("node_sleepy", 5000, 0.05)]).await;
        let schedule = engine.select_leader(3000).await.unwrap();
        assert!(schedule.primary.is_none());
        assert_eq!(
            schedule.result.reason,
            SelectionReason::DensityThresholdNotMet
        );
    }
}

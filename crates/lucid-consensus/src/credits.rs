//! Work-credit tally.
//!
//! For an entity E over a slot window:
//!
//! ```text
//! W_E = max(S_E, ceil(B_E / (BASE_MB_PER_SESSION MiB)))
//! ```
//!
//! where `S_E` sums session-equivalent work (validated signatures, stored
//! chunks, uptime normalized to sessions) and `B_E` sums relayed bytes.
//! The live score is the fraction of window slots in which E submitted at
//! least one proof. Entities rank by `(W desc, live_score desc)`.

use std::collections::{HashMap, HashSet};

use lucid_types::{TaskProof, TaskProofValue, WorkCredit};

use crate::params::BASE_MB_PER_SESSION;

/// One uptime hour counts as one session equivalent.
const UPTIME_SECONDS_PER_SESSION: u64 = 3_600;

/// Session-equivalent contribution of one proof value.
pub fn session_equivalents(value: &TaskProofValue) -> u64 {
    match value {
        TaskProofValue::ValidatedSessions { validated_sessions } => *validated_sessions,
        TaskProofValue::ChunksStored { chunks_stored, .. } => *chunks_stored,
        TaskProofValue::UptimeSeconds { uptime_seconds } => {
            uptime_seconds / UPTIME_SECONDS_PER_SESSION
        }
        TaskProofValue::BytesTransferred { .. } => 0,
    }
}

/// Relayed-byte contribution of one proof value.
pub fn bytes_transferred(value: &TaskProofValue) -> u64 {
    match value {
        TaskProofValue::BytesTransferred { bytes_transferred } => *bytes_transferred,
        _ => 0,
    }
}

/// Credit entity for a proof: the pool when the node works for one,
/// otherwise the node itself.
pub fn credit_entity(proof: &TaskProof) -> &str {
    proof.pool_id.as_deref().unwrap_or(&proof.node_id)
}

/// Tallies ranked work credits for every entity appearing in `proofs`.
///
/// `window_slots` is the denominator of the live score; it must cover the
/// slot range the proofs were drawn from.
pub fn tally_work_credits(proofs: &[TaskProof], window_slots: u64) -> Vec<WorkCredit> {
    #[derive(Default)]
    struct Tally {
        sessions: u64,
        bytes: u64,
        active_slots: HashSet<u64>,
    }

    let mut tallies: HashMap<String, Tally> = HashMap::new();
    for proof in proofs {
        let tally = tallies.entry(credit_entity(proof).to_string()).or_default();
        tally.sessions += session_equivalents(&proof.value);
        tally.bytes += bytes_transferred(&proof.value);
        tally.active_slots.insert(proof.slot);
    }

    let base_bytes = BASE_MB_PER_SESSION * 1024 * 1024;
    let window = window_slots.max(1);

    let mut credits: Vec<WorkCredit> = tallies
        .into_iter()
        .map(|(entity_id, tally)| {
            let bandwidth_sessions = tally.bytes.div_ceil(base_bytes);
            WorkCredit {
                entity_id,
                credits: tally.sessions.max(bandwidth_sessions),
                live_score: tally.active_slots.len() as f64 / window as f64,
                rank: 0,
            }
        })
        .collect();

    credits.sort_by(|a, b| {
        b.credits.cmp(&a.credits).then_with(|| {
            b.live_score
                .partial_cmp(&a.live_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    for (i, credit) in credits.iter_mut().enumerate() {
        credit.rank = i as u32 + 1;
    }
    credits
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lucid_types::TaskProofType;

    fn proof(node: &str, pool: Option<&str>, slot: u64, value: TaskProofValue) -> TaskProof {
        let proof_type = match value {
            TaskProofValue::BytesTransferred { .. } => TaskProofType::RelayBandwidth,
            TaskProofValue::ChunksStored { .. } => TaskProofType::StorageAvailability,
            TaskProofValue::ValidatedSessions { .. } => TaskProofType::ValidationSignature,
            TaskProofValue::UptimeSeconds { .. } => TaskProofType::UptimeBeacon,
        };
        TaskProof {
            node_id: node.into(),
            pool_id: pool.map(str::to_string),
            slot,
            proof_type,
            value,
            signature: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn work_formula_takes_max_of_sessions_and_bandwidth() {
        let proofs = vec![
            proof(
                "node_001",
                None,
                1000,
                TaskProofValue::BytesTransferred {
                    bytes_transferred: 5_000_000,
                },
            ),
            proof(
                "node_001",
                None,
                1001,
                TaskProofValue::ValidatedSessions {
                    validated_sessions: 5,
                },
            ),
        ];
        let credits = tally_work_credits(&proofs, 2);
        assert_eq!(credits.len(), 1);
        // 5 MB relayed rounds up to one bandwidth session; five validated
        // sessions win the max.
        assert_eq!(credits[0].credits, 5);
        assert_eq!(credits[0].entity_id, "node_001");
        assert!((credits[0].live_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bandwidth_rounds_up() {
        let proofs = vec![proof(
            "n",
            None,
            1,
            TaskProofValue::BytesTransferred {
                bytes_transferred: 5 * 1024 * 1024 + 1,
            },
        )];
        let credits = tally_work_credits(&proofs, 1);
        assert_eq!(credits[0].credits, 2);
    }

    #[test]
    fn pool_aggregates_node_work() {
        let proofs = vec![
            proof(
                "node_002",
                Some("pool_001"),
                1000,
                TaskProofValue::ChunksStored {
                    chunks_stored: 100,
                    size_bytes: 1_000_000,
                },
            ),
            proof(
                "node_009",
                Some("pool_001"),
                1001,
                TaskProofValue::ChunksStored {
                    chunks_stored: 50,
                    size_bytes: 500_000,
                },
            ),
        ];
        let credits = tally_work_credits(&proofs, 4);
        assert_eq!(credits[0].entity_id, "pool_001");
        assert_eq!(credits[0].credits, 150);
        assert!((credits[0].live_score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn ranking_is_credits_then_live_score() {
        let proofs = vec![
            proof(
                "busy",
                None,
                1,
                TaskProofValue::ValidatedSessions {
                    validated_sessions: 10,
                },
            ),
            proof(
                "alive",
                None,
                1,
                TaskProofValue::ValidatedSessions {
                    validated_sessions: 10,
                },
            ),
            proof(
                "alive",
                None,
                2,
                TaskProofValue::UptimeSeconds { uptime_seconds: 60 },
            ),
            proof(
                "idle",
                None,
                1,
                TaskProofValue::ValidatedSessions {
                    validated_sessions: 1,
                },
            ),
        ];
        let credits = tally_work_credits(&proofs, 2);
        let order: Vec<_> = credits.iter().map(|c| c.entity_id.as_str()).collect();
        // "alive" ties "busy" on credits but touched more slots.
        assert_eq!(order, vec!["alive", "busy", "idle"]);
        assert_eq!(credits[0].rank, 1);
        assert_eq!(credits[2].rank, 3);
    }
}

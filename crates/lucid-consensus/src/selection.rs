//! Leader selection.
//!
//! Pure selection logic over a ranked credit list and the set of entities
//! currently in cooldown. Store access stays in the engine.
//!
//! With a small cluster it is possible for every ranked entity to be in
//! cooldown at once (three entities cannot cover a 16-slot ban). The
//! cooldown is absolute: such slots get a null primary with the full
//! ranking as fallbacks, and the slot driver falls through to the first
//! fallback for block production. This keeps the no-re-election-within-
//! cooldown invariant unconditional.

use std::collections::HashSet;

use lucid_types::{LeaderSchedule, SelectionReason, SelectionResult, WorkCredit};

use crate::params::D_MIN;
use crate::vrf;

/// Selects the schedule for `slot` from the current ranking.
pub fn select_leader(
    slot: u64,
    ranking: &[WorkCredit],
    in_cooldown: &HashSet<String>,
    vrf_seed: &[u8; 32],
) -> LeaderSchedule {
    let mut fallbacks: Vec<String> = Vec::new();
    let mut winner: Option<&WorkCredit> = None;

    for credit in ranking {
        if in_cooldown.contains(&credit.entity_id) {
            fallbacks.push(credit.entity_id.clone());
            continue;
        }
        winner = Some(credit);
        break;
    }

    let Some(primary) = winner else {
        // Everyone eligible by rank is cooling down.
        return LeaderSchedule {
            slot,
            primary: None,
            fallbacks,
            result: SelectionResult {
                winner: None,
                reason: SelectionReason::CooldownSkip,
            },
        };
    };

    // Resolve ties at the winning rank deterministically.
    let tied: Vec<&str> = ranking
        .iter()
        .filter(|c| {
            !in_cooldown.contains(&c.entity_id)
                && c.credits == primary.credits
                && c.live_score == primary.live_score
        })
        .map(|c| c.entity_id.as_str())
        .collect();

    let (winner_id, tie_broken) = if tied.len() > 1 {
        let picked = vrf::tie_break(vrf_seed, slot, &tied)
            .unwrap_or(primary.entity_id.as_str())
            .to_string();
        (picked, true)
    } else {
        (primary.entity_id.clone(), false)
    };

    let winner_score = ranking
        .iter()
        .find(|c| c.entity_id == winner_id)
        .map(|c| c.live_score)
        .unwrap_or(0.0);

    // Density gate on the would-be primary.
    if winner_score < D_MIN {
        return LeaderSchedule {
            slot,
            primary: None,
            fallbacks,
            result: SelectionResult {
                winner: None,
                reason: SelectionReason::DensityThresholdNotMet,
            },
        };
    }

    let reason = if tie_broken {
        SelectionReason::VrfTieBreak
    } else if fallbacks.is_empty() {
        SelectionReason::HighestCredits
    } else {
        SelectionReason::CooldownSkip
    };

    LeaderSchedule {
        slot,
        primary: Some(winner_id.clone()),
        fallbacks,
        result: SelectionResult {
            winner: Some(winner_id),
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credit(entity: &str, credits: u64, live: f64, rank: u32) -> WorkCredit {
        WorkCredit {
            entity_id: entity.into(),
            credits,
            live_score: live,
            rank,
        }
    }

    fn seed() -> [u8; 32] {
        [3u8; 32]
    }

    #[test]
    fn highest_credits_wins_without_cooldowns() {
        let ranking = vec![
            credit("node_001", 1000, 0.95, 1),
            credit("node_002", 500, 0.90, 2),
        ];
        let schedule = select_leader(1000, &ranking, &HashSet::new(), &seed());
        assert_eq!(schedule.primary.as_deref(), Some("node_001"));
        assert_eq!(schedule.result.reason, SelectionReason::HighestCredits);
        assert!(schedule.fallbacks.is_empty());
    }

    #[test]
    fn cooldown_skips_to_next_rank() {
        let ranking = vec![
            credit("node_001", 1000, 0.95, 1),
            credit("node_002", 950, 0.90, 2),
            credit("node_003", 900, 0.85, 3),
        ];
        let cooling: HashSet<String> = ["node_001".to_string()].into();
        let schedule = select_leader(1005, &ranking, &cooling, &seed());
        assert_eq!(schedule.primary.as_deref(), Some("node_002"));
        assert_eq!(schedule.fallbacks, vec!["node_001".to_string()]);
        assert_eq!(schedule.result.reason, SelectionReason::CooldownSkip);
    }

    #[test]
    fn ties_resolve_by_vrf() {
        let ranking = vec![
            credit("node_001", 1000, 0.95, 1),
            credit("node_002", 1000, 0.95, 1),
            credit("node_003", 1000, 0.95, 1),
        ];
        let schedule = select_leader(1000, &ranking, &HashSet::new(), &seed());
        assert!(schedule.primary.is_some());
        assert_eq!(schedule.result.reason, SelectionReason::VrfTieBreak);

        // Deterministic across repeated evaluations.
        let again = select_leader(1000, &ranking, &HashSet::new(), &seed());
        assert_eq!(schedule.primary, again.primary);
    }

    #[test]
    fn low_density_yields_no_primary() {
        let ranking = vec![credit("node_001", 100, 0.1, 1)];
        let schedule = select_leader(1000, &ranking, &HashSet::new(), &seed());
        assert!(schedule.primary.is_none());
        assert_eq!(
            schedule.result.reason,
            SelectionReason::DensityThresholdNotMet
        );
    }

    #[test]
    fn all_cooling_down_yields_fallbacks_only() {
        let ranking = vec![
            credit("node_001", 1000, 0.95, 1),
            credit("node_002", 950, 0.90, 2),
        ];
        let cooling: HashSet<String> =
            ["node_001".to_string(), "node_002".to_string()].into();
        let schedule = select_leader(1003, &ranking, &cooling, &seed());
        assert!(schedule.primary.is_none());
        assert_eq!(
            schedule.fallbacks,
            vec!["node_001".to_string(), "node_002".to_string()]
        );
        assert_eq!(schedule.result.reason, SelectionReason::CooldownSkip);
    }

    #[test]
    fn empty_ranking_has_no_primary() {
        let schedule = select_leader(1, &[], &HashSet::new(), &seed());
        assert!(schedule.primary.is_none());
        assert!(schedule.fallbacks.is_empty());
    }
}

//! Consensus parameters.
//!
//! Frozen at compile time. Configuration may surface them read-only, but
//! nothing mutates them at runtime.

/// Slot length in seconds.
pub const SLOT_DURATION_SEC: u64 = 120;

/// Budget for one leader selection, after which the driver falls through to
/// the first fallback.
pub const SLOT_TIMEOUT_MS: u64 = 5_000;

/// Ban period after holding a primary slot.
pub const COOLDOWN_SLOTS: u64 = 16;

/// Sliding work-credit window length in days.
pub const LEADER_WINDOW_DAYS: u64 = 7;

/// Minimum live score required to hold a primary slot.
pub const D_MIN: f64 = 0.2;

/// Bandwidth normalization: this many MiB of relayed traffic counts as one
/// session equivalent.
pub const BASE_MB_PER_SESSION: u64 = 5;

/// Window length expressed in slots.
pub const LEADER_WINDOW_SLOTS: u64 = LEADER_WINDOW_DAYS * 24 * 60 * 60 / SLOT_DURATION_SEC;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_match_protocol() {
        assert_eq!(SLOT_DURATION_SEC, 120);
        assert_eq!(SLOT_TIMEOUT_MS, 5_000);
        assert_eq!(COOLDOWN_SLOTS, 16);
        assert_eq!(LEADER_WINDOW_DAYS, 7);
        assert_eq!(D_MIN, 0.2);
        assert_eq!(BASE_MB_PER_SESSION, 5);
        assert_eq!(LEADER_WINDOW_SLOTS, 5_040);
    }
}

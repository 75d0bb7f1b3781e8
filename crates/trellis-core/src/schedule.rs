//! Reward and pricing schedule per membership level.
//!
//! Level pricing rises linearly: Level 1 costs 100 units and each level
//! adds 50 (Level 19 = 1000). The layer reward for a Level-N upgrade is
//! `50 + 50·N` units, paid to the N-th chain ancestor:
//! - N=1 → 100 units
//! - N=2 → 150 units
//! - …
//! - N=19 → 1000 units

use crate::constants::{CENTS, MAX_LEVEL};

/// The layer reward fired by an upgrade to `level`, in cents.
///
/// # Examples
///
/// ```
/// use trellis_core::schedule::level_reward_cents;
/// assert_eq!(level_reward_cents(1), 100_00);
/// assert_eq!(level_reward_cents(19), 1000_00);
/// ```
pub fn level_reward_cents(level: u8) -> u64 {
    (50 + 50 * level as u64) * CENTS
}

/// The upgrade price of `level`, in cents. `level` must be at least 1;
/// level 0 (unactivated) has no price and returns 0.
pub fn level_price_cents(level: u8) -> u64 {
    if level == 0 {
        return 0;
    }
    (100 + 50 * (level as u64 - 1)) * CENTS
}

/// Whether `level` is a valid upgrade trigger (`1..=19`).
pub fn is_valid_trigger_level(level: u8) -> bool {
    (1..=MAX_LEVEL).contains(&level)
}

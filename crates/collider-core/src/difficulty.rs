//! Difficulty of the next block: an EIP-2 style retarget against an 8 second
//! window, followed by the height-triggered difficulty bomb.

use crate::constants::{
    ADJUSTMENT_FLOOR, BOMB_GRACE_PERIODS, BOMB_PERIOD, DIFFICULTY_DIVISOR,
    ELAPSED_BONUS_OFFSET, TARGET_TIME_WINDOW,
};
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Retargeted difficulty, never below `minimum_difficulty`.
///
/// Times are in seconds. Integer division floors toward negative infinity,
/// which matters when the clock runs backwards (`current_time < previous_time`).
pub fn difficulty_retarget(
    current_time: u64,
    previous_time: u64,
    previous_difficulty: &BigUint,
    minimum_difficulty: &BigUint,
    new_block_count: u64,
) -> BigUint {
    debug!(
        current_time,
        previous_time, new_block_count, "retargeting difficulty"
    );

    let mut elapsed = BigInt::from(current_time) - BigInt::from(previous_time);
    let bonus = &elapsed
        + (&elapsed - BigInt::from(ELAPSED_BONUS_OFFSET)) * BigInt::from(new_block_count);
    if bonus.is_positive() {
        elapsed = bonus;
    }

    let mut x = BigInt::one() - elapsed.div_floor(&BigInt::from(TARGET_TIME_WINDOW));
    let floor = BigInt::from(ADJUSTMENT_FLOOR);
    if x < floor {
        x = floor;
    }

    let previous = BigInt::from(previous_difficulty.clone());
    let y = previous.div_floor(&BigInt::from(DIFFICULTY_DIVISOR));
    let adjusted = x * y + previous;

    match adjusted.to_biguint() {
        Some(value) if &value > minimum_difficulty => value,
        _ => minimum_difficulty.clone(),
    }
}

/// Adds `2^(period - 2)` once `(parent_height + 1) / 66_000_000` exceeds 2.
pub fn difficulty_bomb(calculated_difficulty: BigUint, parent_height: u64) -> BigUint {
    let period = (u128::from(parent_height) + 1) / u128::from(BOMB_PERIOD);
    let grace = u128::from(BOMB_GRACE_PERIODS);
    if period > grace {
        calculated_difficulty + (BigUint::one() << (period - grace))
    } else {
        calculated_difficulty
    }
}

/// Floor difficulty for a network rovering `child_chain_count` chains.
///
/// A zero count is treated as one chain.
pub fn minimum_difficulty(base: &BigUint, child_chain_count: usize) -> BigUint {
    base / BigUint::from(child_chain_count.max(1))
}

/// Per-chain share of a parent block's difficulty.
pub fn parent_share(parent_difficulty: &BigUint, child_chain_count: usize) -> BigUint {
    parent_difficulty / BigUint::from(child_chain_count.max(1))
}

/// Everything needed to recompute a proposal's difficulty at a later second.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyContext {
    pub previous_timestamp: u64,
    #[serde(with = "crate::decimal")]
    pub previous_difficulty: BigUint,
    pub previous_height: u64,
    #[serde(with = "crate::decimal")]
    pub minimum_difficulty: BigUint,
    pub new_block_count: u64,
}

impl DifficultyContext {
    /// Retarget plus bomb, evaluated at `now` (seconds).
    pub fn difficulty_at(&self, now: u64) -> BigUint {
        let pre_exp = difficulty_retarget(
            now,
            self.previous_timestamp,
            &self.previous_difficulty,
            &self.minimum_difficulty,
            self.new_block_count,
        );
        difficulty_bomb(pre_exp, self.previous_height)
    }

    /// A recalculator for the mining loop.
    pub fn recalculator(&self) -> impl FnMut(u64) -> BigUint + Send + '_ {
        move |now| self.difficulty_at(now)
    }
}

/// Divides non-negative values rounding to the nearest integer, with
/// halves rounded up.
pub(crate) fn div_round(numerator: &BigUint, divisor: u32) -> BigUint {
    if divisor == 0 {
        return BigUint::zero();
    }
    let divisor = BigUint::from(divisor);
    let (quotient, remainder) = numerator.div_rem(&divisor);
    if remainder * 2u32 >= divisor {
        quotient + 1u32
    } else {
        quotient
    }
}

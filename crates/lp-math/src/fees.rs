//! Unclaimed fee accounting from fee-growth counters.
//!
//! Pools accumulate fees per unit of liquidity in Q128 counters:
//! `feeGrowthGlobal` for the whole pool and, per initialized tick,
//! `feeGrowthOutside` (growth on the side of the tick away from the current
//! price). Growth inside a range is recovered as
//!
//! ```text
//! below  = tick >= lower ? outside(lower) : global - outside(lower)
//! above  = tick <  upper ? outside(upper) : global - outside(upper)
//! inside = global - below - above
//! ```
//!
//! which reduces to `outside(lower) - outside(upper)` under the range,
//! `global - outside(lower) - outside(upper)` inside it, and
//! `outside(upper) - outside(lower)` above it. The counters are `uint256` and
//! wrap: every subtraction is taken modulo 2^256 and a "negative" intermediate
//! is expected, not an error.
//!
//! Unclaimed fees are then
//! `tokensOwed + liquidity × (inside - insideLast mod 2^256) / 2^128`.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::price::to_display_units;

/// Per-token pair of Q128 fee-growth counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeGrowth {
    pub token0: U256,
    pub token1: U256,
}

impl FeeGrowth {
    pub const fn new(token0: U256, token1: U256) -> Self {
        Self { token0, token1 }
    }

    /// Component-wise `self - other` modulo 2^256.
    pub fn wrapping_sub(self, other: Self) -> Self {
        Self {
            token0: self.token0.wrapping_sub(other.token0),
            token1: self.token1.wrapping_sub(other.token1),
        }
    }
}

/// Fee-growth record of one range boundary tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickFeeGrowth {
    pub outside: FeeGrowth,
    pub initialized: bool,
}

/// Pool-side inputs for exact fee accounting of one position.
///
/// `None` on a boundary means the read for that tick was unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolFeeGrowth {
    pub global: FeeGrowth,
    pub lower: Option<TickFeeGrowth>,
    pub upper: Option<TickFeeGrowth>,
}

/// Position-side fee state as stored by the position manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionFees {
    pub liquidity: u128,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub fee_growth_inside_last: FeeGrowth,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

/// How unclaimed fees were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    /// Full fee-growth accounting.
    Exact,
    /// Fee-growth accounting with an uninitialized boundary tick counted as zero.
    ExactPartial,
    /// Only the settled `tokensOwed`; under-reports once trades happened.
    OwedOnly,
}

impl FeeSource {
    /// Anything short of [`FeeSource::Exact`] is reported as reduced confidence.
    pub fn is_degraded(self) -> bool {
        !matches!(self, Self::Exact)
    }
}

/// Unclaimed fees in native token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnclaimedFees {
    pub fee0: U256,
    pub fee1: U256,
    pub source: FeeSource,
}

impl UnclaimedFees {
    /// Fees divided by `10^decimals` for display.
    pub fn to_display(&self, decimals0: u8, decimals1: u8) -> (f64, f64) {
        (
            to_display_units(self.fee0, decimals0),
            to_display_units(self.fee1, decimals1),
        )
    }
}

/// Fee growth inside `[tick_lower, tick_upper)` given the current tick.
pub fn fee_growth_inside(
    global: FeeGrowth,
    lower_outside: FeeGrowth,
    upper_outside: FeeGrowth,
    current_tick: i32,
    tick_lower: i32,
    tick_upper: i32,
) -> FeeGrowth {
    let below = if current_tick >= tick_lower {
        lower_outside
    } else {
        global.wrapping_sub(lower_outside)
    };
    let above = if current_tick < tick_upper {
        upper_outside
    } else {
        global.wrapping_sub(upper_outside)
    };
    global.wrapping_sub(below).wrapping_sub(above)
}

/// `liquidity × delta / 2^128`, floored, without a 512-bit intermediate.
///
/// `delta` is split at bit 128 so each partial product fits in 256 bits:
/// `(hi·2^128 + lo)·L / 2^128 = hi·L + lo·L / 2^128`.
pub fn accrued_fee(delta_x128: U256, liquidity: u128) -> U256 {
    let liquidity = U256::from(liquidity);
    let hi: U256 = delta_x128 >> 128;
    let lo: U256 = delta_x128 & U256::from(u128::MAX);
    (hi * liquidity).wrapping_add((lo * liquidity) >> 128)
}

/// Degraded fees: only what the position manager already settled.
pub fn owed_only(position: &PositionFees) -> UnclaimedFees {
    UnclaimedFees {
        fee0: U256::from(position.tokens_owed0),
        fee1: U256::from(position.tokens_owed1),
        source: FeeSource::OwedOnly,
    }
}

/// Unclaimed fees for a position, exact when the pool-side counters are known.
///
/// Falls back to [`owed_only`] when `pool` is `None` or either boundary read is
/// missing. An uninitialized boundary tick contributes zero growth and tags the
/// result [`FeeSource::ExactPartial`].
pub fn compute_unclaimed_fees(
    position: &PositionFees,
    pool: Option<&PoolFeeGrowth>,
    current_tick: i32,
) -> UnclaimedFees {
    let Some(pool) = pool else {
        return owed_only(position);
    };
    let (Some(lower), Some(upper)) = (pool.lower, pool.upper) else {
        return owed_only(position);
    };

    let source = if lower.initialized && upper.initialized {
        FeeSource::Exact
    } else {
        FeeSource::ExactPartial
    };
    let outside = |tick: TickFeeGrowth| {
        if tick.initialized {
            tick.outside
        } else {
            FeeGrowth::default()
        }
    };

    let inside = fee_growth_inside(
        pool.global,
        outside(lower),
        outside(upper),
        current_tick,
        position.tick_lower,
        position.tick_upper,
    );
    let delta = inside.wrapping_sub(position.fee_growth_inside_last);

    UnclaimedFees {
        fee0: U256::from(position.tokens_owed0)
            .wrapping_add(accrued_fee(delta.token0, position.liquidity)),
        fee1: U256::from(position.tokens_owed1)
            .wrapping_add(accrued_fee(delta.token1, position.liquidity)),
        source,
    }
}

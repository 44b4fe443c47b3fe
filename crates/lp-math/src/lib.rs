//! lp-math: concentrated-liquidity position math.
//!
//! Pure functions over integers read from chain: tick and price conversion,
//! token amounts held by a range, unclaimed fees from Q128 fee-growth
//! counters, and the display orientation of a pair. No I/O.

pub mod amounts;
pub mod error;
pub mod fees;
pub mod normalize;
pub mod price;
pub mod tick_math;

pub use amounts::{
    compute_amounts, exit_amounts, range_position_pct, ExitAmounts, RangeStatus, TokenAmounts,
};
pub use error::MathError;
pub use fees::{
    compute_unclaimed_fees, owed_only, FeeGrowth, FeeSource, PoolFeeGrowth, PositionFees,
    TickFeeGrowth, UnclaimedFees,
};
pub use normalize::{denormalize, normalize, NormalizedRange, QuoteClassifier, StableSymbols};
pub use price::{sqrt_price_x96_to_price, to_display_units, u256_to_f64};
pub use tick_math::{sqrt_price_at_tick, tick_to_price, MAX_TICK, MIN_TICK};

//! Token composition of a concentrated-liquidity position.
//!
//! With $\sqrt{P}$ the current square-root price and $\sqrt{P_a}, \sqrt{P_b}$
//! the range bounds, a position of liquidity $L$ holds:
//!
//! | Region | amount0 | amount1 |
//! |---|---|---|
//! | `tick < lower` | $L \frac{\sqrt{P_b} - \sqrt{P_a}}{\sqrt{P_a}\sqrt{P_b}}$ | 0 |
//! | `lower <= tick < upper` | $L \frac{\sqrt{P_b} - \sqrt{P}}{\sqrt{P}\sqrt{P_b}}$ | $L(\sqrt{P} - \sqrt{P_a})$ |
//! | `tick >= upper` | 0 | $L(\sqrt{P_b} - \sqrt{P_a})$ |
//!
//! ## Approximation
//!
//! These closed forms assume a continuous price evaluated at the tick
//! boundary. The pool contract rounds every step in Q64.96 integer math and
//! uses the exact `sqrtPriceX96`, so results here agree with what a burn
//! would return only to floating-point precision, not bit for bit.

use serde::{Deserialize, Serialize};

use crate::error::MathError;
use crate::tick_math::{check_range, check_tick, sqrt_price_at_tick, unit_scale};

/// Where the current tick sits relative to a position's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    /// `tick < tick_lower`: all token0, earning nothing.
    Below,
    /// `tick_lower <= tick < tick_upper`: mixed, earning fees.
    InRange,
    /// `tick >= tick_upper`: all token1, earning nothing.
    Above,
}

impl RangeStatus {
    /// Classify `current_tick` against `[tick_lower, tick_upper)`.
    pub fn of(current_tick: i32, tick_lower: i32, tick_upper: i32) -> Self {
        if current_tick < tick_lower {
            Self::Below
        } else if current_tick < tick_upper {
            Self::InRange
        } else {
            Self::Above
        }
    }

    /// True only for [`RangeStatus::InRange`].
    pub fn is_in_range(self) -> bool {
        matches!(self, Self::InRange)
    }
}

/// Token amounts in display units (already divided by `10^decimals`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenAmounts {
    pub amount0: f64,
    pub amount1: f64,
}

/// Current token0/token1 holdings of a position.
///
/// `liquidity == 0` returns `(0, 0)` without evaluating any power.
///
/// # Errors
/// Returns [`MathError::InvalidRange`] when `tick_lower >= tick_upper` and
/// [`MathError::TickOutOfRange`] for any tick outside the domain.
pub fn compute_amounts(
    liquidity: u128,
    current_tick: i32,
    tick_lower: i32,
    tick_upper: i32,
    decimals0: u8,
    decimals1: u8,
) -> Result<TokenAmounts, MathError> {
    check_range(tick_lower, tick_upper)?;
    check_tick(current_tick)?;

    if liquidity == 0 {
        return Ok(TokenAmounts::default());
    }

    let liquidity = liquidity as f64;
    let sqrt_a = sqrt_price_at_tick(tick_lower)?;
    let sqrt_b = sqrt_price_at_tick(tick_upper)?;

    let (raw0, raw1) = match RangeStatus::of(current_tick, tick_lower, tick_upper) {
        RangeStatus::Below => (liquidity * (sqrt_b - sqrt_a) / (sqrt_a * sqrt_b), 0.0),
        RangeStatus::InRange => {
            let sqrt_p = sqrt_price_at_tick(current_tick)?;
            (
                liquidity * (sqrt_b - sqrt_p) / (sqrt_p * sqrt_b),
                liquidity * (sqrt_p - sqrt_a),
            )
        }
        RangeStatus::Above => (0.0, liquidity * (sqrt_b - sqrt_a)),
    };

    Ok(TokenAmounts {
        amount0: raw0 / unit_scale(decimals0),
        amount1: raw1 / unit_scale(decimals1),
    })
}

/// Single-sided holdings once the price leaves the range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExitAmounts {
    /// Price fell through `tick_lower`: everything converted to token0.
    pub below: TokenAmounts,
    /// Price rose through `tick_upper`: everything converted to token1.
    pub above: TokenAmounts,
}

/// Holdings at both range exits, independent of the current tick.
///
/// # Errors
/// Same range errors as [`compute_amounts`].
pub fn exit_amounts(
    liquidity: u128,
    tick_lower: i32,
    tick_upper: i32,
    decimals0: u8,
    decimals1: u8,
) -> Result<ExitAmounts, MathError> {
    check_range(tick_lower, tick_upper)?;
    if liquidity == 0 {
        return Ok(ExitAmounts::default());
    }

    let liquidity = liquidity as f64;
    let sqrt_a = sqrt_price_at_tick(tick_lower)?;
    let sqrt_b = sqrt_price_at_tick(tick_upper)?;

    Ok(ExitAmounts {
        below: TokenAmounts {
            amount0: liquidity * (sqrt_b - sqrt_a) / (sqrt_a * sqrt_b) / unit_scale(decimals0),
            amount1: 0.0,
        },
        above: TokenAmounts {
            amount0: 0.0,
            amount1: liquidity * (sqrt_b - sqrt_a) / unit_scale(decimals1),
        },
    })
}

/// Position of the current tick inside the range, as a percentage.
///
/// Clamped to `[0, 100]`; a zero-width range reports the midpoint.
pub fn range_position_pct(current_tick: i32, tick_lower: i32, tick_upper: i32) -> f64 {
    let width = i64::from(tick_upper) - i64::from(tick_lower);
    if width == 0 {
        return 50.0;
    }
    let offset = i64::from(current_tick) - i64::from(tick_lower);
    (offset as f64 / width as f64 * 100.0).clamp(0.0, 100.0)
}

//! Tick ⇄ price primitives.
//!
//! ## Math
//!
//! A tick is a log-price coordinate: $P = 1.0001^{tick}$ gives token1 per token0
//! in raw (native integer) units. Human prices adjust for the decimal difference:
//!
//! $$price = 1.0001^{tick} \times 10^{decimals_0 - decimals_1}$$
//!
//! ## Stability
//!
//! Powers are evaluated as `exp(tick · ln 1.0001)` rather than by repeated
//! multiplication. At the domain edge (`|tick| = 887272`) the raw price is
//! about `3.4e38`, which an `f64` represents with its full 53-bit mantissa.
//! The square-root form halves the exponent, matching how pools store
//! `sqrtPriceX96` on-chain.

use crate::error::MathError;

/// Lowest tick a pool can address.
pub const MIN_TICK: i32 = -887_272;

/// Highest tick a pool can address.
pub const MAX_TICK: i32 = 887_272;

/// `ln(1.0001)`.
const LN_TICK_BASE: f64 = 9.999_500_033_329_732e-5;

/// Reject ticks outside `[MIN_TICK, MAX_TICK]`.
///
/// # Errors
/// Returns [`MathError::TickOutOfRange`] for out-of-domain ticks.
pub fn check_tick(tick: i32) -> Result<(), MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfRange { tick });
    }
    Ok(())
}

/// Validate a position range: both bounds in the domain and `lower < upper`.
///
/// # Errors
/// Returns [`MathError::InvalidRange`] when `lower >= upper`, or
/// [`MathError::TickOutOfRange`] when either bound leaves the domain.
pub fn check_range(tick_lower: i32, tick_upper: i32) -> Result<(), MathError> {
    check_tick(tick_lower)?;
    check_tick(tick_upper)?;
    if tick_lower >= tick_upper {
        return Err(MathError::InvalidRange {
            lower: tick_lower,
            upper: tick_upper,
        });
    }
    Ok(())
}

/// `1.0001^(tick / 2)`, the square root of the raw price at `tick`.
///
/// # Errors
/// Returns [`MathError::TickOutOfRange`] outside the tick domain.
pub fn sqrt_price_at_tick(tick: i32) -> Result<f64, MathError> {
    check_tick(tick)?;
    Ok((f64::from(tick) * LN_TICK_BASE * 0.5).exp())
}

/// Human price of token0 denominated in token1 at `tick`.
///
/// # Errors
/// Returns [`MathError::TickOutOfRange`] outside the tick domain.
pub fn tick_to_price(tick: i32, decimals0: u8, decimals1: u8) -> Result<f64, MathError> {
    check_tick(tick)?;
    let raw = (f64::from(tick) * LN_TICK_BASE).exp();
    Ok(raw * decimal_scale(decimals0, decimals1))
}

/// `10^(decimals0 - decimals1)`.
pub fn decimal_scale(decimals0: u8, decimals1: u8) -> f64 {
    10f64.powi(i32::from(decimals0) - i32::from(decimals1))
}

/// `10^decimals`, the divisor from native integer units to display units.
pub fn unit_scale(decimals: u8) -> f64 {
    10f64.powi(i32::from(decimals))
}

//! Price conversion from a pool's `sqrtPriceX96`.
//!
//! `sqrtPriceX96` encodes $\sqrt{P} \times 2^{96}$ where $P = \frac{token1}{token0}$
//! in raw units. `slot0()` returns it alongside the tick; the tick is only the
//! floor of $\log_{1.0001} P$, so the current price shown to users comes from
//! here while range membership keeps using the tick.
//!
//! `sqrtPriceX96` is a `uint160`. Squaring it in integers needs 320 bits, so the
//! square root is brought into `f64` first (53 significant bits, ~16 digits) and
//! squared there.

use alloy::primitives::U256;

use crate::tick_math::{decimal_scale, unit_scale};

/// `2^96` as `f64`.
pub const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

/// `2^64` as `f64`.
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Convert a 256-bit unsigned integer to the nearest `f64`.
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * TWO_POW_64 + *limb as f64)
}

/// Native integer token amount to display units (`value / 10^decimals`).
pub fn to_display_units(value: U256, decimals: u8) -> f64 {
    u256_to_f64(value) / unit_scale(decimals)
}

/// Human price of token0 denominated in token1 from `sqrtPriceX96`.
///
/// Returns `0.0` for a zero square-root price (uninitialized pool).
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> f64 {
    if sqrt_price_x96.is_zero() {
        return 0.0;
    }
    let sqrt_price = u256_to_f64(sqrt_price_x96) / Q96;
    sqrt_price * sqrt_price * decimal_scale(decimals0, decimals1)
}

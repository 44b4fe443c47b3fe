//! Valuation of a single position snapshot.
//!
//! Amounts use the continuous-tick closed form (see
//! [`lp_math::compute_amounts`]), so they approximate the pool contract's own
//! rounding rather than match it bit for bit.

use chrono::NaiveDate;
use lp_data::PositionSnapshot;
use lp_math::{
    compute_amounts, compute_unclaimed_fees, exit_amounts, normalize, range_position_pct,
    sqrt_price_x96_to_price, tick_to_price, FeeSource, MathError, QuoteClassifier, RangeStatus,
};
use serde::Serialize;
use tracing::debug;

use crate::analytics::{analyze, DepositBasis, PositionAnalytics};
use crate::error::ValuationError;
use crate::pricing::UsdPrices;

/// Holdings and USD value if the price leaves the range on one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitScenario {
    pub amount0: f64,
    pub amount1: f64,
    /// Valued at the boundary price with token1's USD price held constant.
    pub value_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitScenarios {
    pub below: ExitScenario,
    pub above: ExitScenario,
}

/// Everything shown for one position. Recomputed on every pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReport {
    /// Position token id, decimal.
    pub id: String,
    pub pair_label: String,
    pub base: String,
    pub quote: String,
    pub symbol0: String,
    pub symbol1: String,
    /// Hundredths of a basis point (3000 = 0.30%).
    pub fee_tier: u32,
    pub status: RangeStatus,
    pub in_range: bool,
    pub is_empty: bool,
    pub amount0: f64,
    pub amount1: f64,
    pub fee0: f64,
    pub fee1: f64,
    pub fee_source: FeeSource,
    pub fees_degraded: bool,
    pub value_usd: f64,
    pub fees_usd: f64,
    pub token0_usd: f64,
    pub token1_usd: f64,
    pub prices_estimated: bool,
    /// Display orientation (quote per base).
    pub price_low: f64,
    pub price_high: f64,
    pub price_current: f64,
    pub inverted: bool,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub current_tick: i32,
    pub range_position_pct: f64,
    pub roi_pct: Option<f64>,
    pub apr_pct: Option<f64>,
    pub analytics: Option<PositionAnalytics>,
    pub exits: ExitScenarios,
}

impl PositionReport {
    pub fn total_usd(&self) -> f64 {
        self.value_usd + self.fees_usd
    }
}

/// Token1 per token0 at the pool's current price.
///
/// Taken from `sqrtPriceX96`; an uninitialized pool falls back to the tick.
///
/// # Errors
/// Returns [`MathError::TickOutOfRange`] if that fallback tick is invalid.
pub fn current_price(snapshot: &PositionSnapshot) -> Result<f64, MathError> {
    let (decimals0, decimals1) = (snapshot.token0.decimals, snapshot.token1.decimals);
    let price = sqrt_price_x96_to_price(snapshot.pool.sqrt_price_x96, decimals0, decimals1);
    if price > 0.0 && price.is_finite() {
        Ok(price)
    } else {
        tick_to_price(snapshot.pool.tick, decimals0, decimals1)
    }
}

/// Value one position at the given USD prices.
///
/// `basis` enables ROI/APR and the HODL comparison.
///
/// # Errors
/// Returns [`ValuationError::Math`] for an invalid range or a tick outside the
/// protocol domain.
pub fn value_position<C>(
    snapshot: &PositionSnapshot,
    prices: &UsdPrices,
    basis: Option<&DepositBasis>,
    today: NaiveDate,
    classifier: &C,
) -> Result<PositionReport, ValuationError>
where
    C: QuoteClassifier + ?Sized,
{
    let position = &snapshot.position;
    let (decimals0, decimals1) = (snapshot.token0.decimals, snapshot.token1.decimals);
    let tick = snapshot.pool.tick;

    let amounts = compute_amounts(
        position.liquidity,
        tick,
        position.tick_lower,
        position.tick_upper,
        decimals0,
        decimals1,
    )?;

    let fees = compute_unclaimed_fees(&position.fee_state(), snapshot.fee_growth.as_ref(), tick);
    if fees.source.is_degraded() {
        debug!(token_id = %position.token_id, source = ?fees.source, "fees degraded");
    }
    let (fee0, fee1) = fees.to_display(decimals0, decimals1);

    let price_low = tick_to_price(position.tick_lower, decimals0, decimals1)?;
    let price_high = tick_to_price(position.tick_upper, decimals0, decimals1)?;
    let price_current = current_price(snapshot)?;
    let display = normalize(
        &snapshot.token0.symbol,
        &snapshot.token1.symbol,
        price_low,
        price_high,
        price_current,
        classifier,
    );

    let value_usd = prices.value(amounts.amount0, amounts.amount1);
    let fees_usd = prices.value(fee0, fee1);

    let exits = exit_amounts(
        position.liquidity,
        position.tick_lower,
        position.tick_upper,
        decimals0,
        decimals1,
    )?;
    let exits = ExitScenarios {
        below: ExitScenario {
            amount0: exits.below.amount0,
            amount1: exits.below.amount1,
            value_usd: exits.below.amount0 * price_low * prices.token1,
        },
        above: ExitScenario {
            amount0: exits.above.amount0,
            amount1: exits.above.amount1,
            value_usd: exits.above.amount1 * prices.token1,
        },
    };

    let analytics = basis.map(|basis| analyze(basis, today, prices, value_usd, fees_usd));
    let status = RangeStatus::of(tick, position.tick_lower, position.tick_upper);

    Ok(PositionReport {
        id: position.token_id.to_string(),
        pair_label: display.pair_label,
        base: display.base,
        quote: display.quote,
        symbol0: snapshot.token0.symbol.clone(),
        symbol1: snapshot.token1.symbol.clone(),
        fee_tier: position.fee,
        status,
        in_range: status.is_in_range(),
        is_empty: position.is_empty(),
        amount0: amounts.amount0,
        amount1: amounts.amount1,
        fee0,
        fee1,
        fee_source: fees.source,
        fees_degraded: fees.source.is_degraded(),
        value_usd,
        fees_usd,
        token0_usd: prices.token0,
        token1_usd: prices.token1,
        prices_estimated: prices.estimated,
        price_low: display.price_low,
        price_high: display.price_high,
        price_current: display.price_current,
        inverted: display.inverted,
        tick_lower: position.tick_lower,
        tick_upper: position.tick_upper,
        current_tick: tick,
        range_position_pct: range_position_pct(tick, position.tick_lower, position.tick_upper),
        roi_pct: analytics.and_then(|a| a.roi_pct),
        apr_pct: analytics.and_then(|a| a.apr_pct),
        analytics,
        exits,
    })
}

//! USD prices for the two tokens of a position.
//!
//! Each side is resolved in order:
//! 1. stable symbol: 1.0, no I/O;
//! 2. spot source, bounded by the configured timeout;
//! 3. caller fallback constant.
//!
//! If one side is still unknown it is derived from the other through the pool
//! price. Anything past step 2 marks the result as estimated.

use lp_data::SpotPriceSource;
use lp_math::QuoteClassifier;
use serde::Serialize;
use tracing::{debug, warn};

use crate::settings::ValuationSettings;

/// Resolved USD prices of token0 and token1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsdPrices {
    pub token0: f64,
    pub token1: f64,
    /// A fallback or a derivation was used for at least one side.
    pub estimated: bool,
}

impl UsdPrices {
    /// USD value of display-unit amounts.
    pub fn value(&self, amount0: f64, amount1: f64) -> f64 {
        amount0 * self.token0 + amount1 * self.token1
    }
}

/// Price of one side and whether it came from a fallback.
async fn side_price<S>(spot: &S, settings: &ValuationSettings, symbol: &str) -> Option<(f64, bool)>
where
    S: SpotPriceSource,
{
    if settings.stable_symbols.is_quote(symbol) {
        return Some((1.0, false));
    }

    if symbol != lp_data::types::UNKNOWN_SYMBOL {
        match tokio::time::timeout(settings.spot_timeout, spot.spot_price(symbol)).await {
            Ok(Ok(price)) if price.is_finite() && price > 0.0 => return Some((price, false)),
            Ok(Ok(price)) => debug!(symbol, price, "ignoring non-positive spot price"),
            Ok(Err(error)) => debug!(symbol, error = %error, "spot price unavailable"),
            Err(_) => warn!(
                symbol,
                timeout_ms = settings.spot_timeout.as_millis() as u64,
                "spot price lookup timed out"
            ),
        }
    }

    let fallback = settings.fallback_price(symbol);
    if fallback.is_some() {
        warn!(symbol, "using fallback USD price");
    }
    fallback.map(|price| (price, true))
}

/// Resolve both sides.
///
/// `pool_price` is token1 per token0 in display units.
pub async fn resolve_usd_prices<S>(
    spot: &S,
    settings: &ValuationSettings,
    symbol0: &str,
    symbol1: &str,
    pool_price: f64,
) -> UsdPrices
where
    S: SpotPriceSource,
{
    let (side0, side1) = futures::join!(
        side_price(spot, settings, symbol0),
        side_price(spot, settings, symbol1)
    );
    let usable_pool_price = pool_price.is_finite() && pool_price > 0.0;

    match (side0, side1) {
        (Some((token0, est0)), Some((token1, est1))) => UsdPrices {
            token0,
            token1,
            estimated: est0 || est1,
        },
        (Some((token0, _)), None) if usable_pool_price => UsdPrices {
            token0,
            token1: token0 / pool_price,
            estimated: true,
        },
        (None, Some((token1, _))) if usable_pool_price => UsdPrices {
            token0: token1 * pool_price,
            token1,
            estimated: true,
        },
        (side0, side1) => {
            warn!(symbol0, symbol1, "no USD price for pair; valuing unknown sides at zero");
            UsdPrices {
                token0: side0.map_or(0.0, |(price, _)| price),
                token1: side1.map_or(0.0, |(price, _)| price),
                estimated: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::time::Duration;

    use lp_data::ReadError;

    use super::*;

    struct StaticSpot(HashMap<&'static str, f64>);

    impl SpotPriceSource for StaticSpot {
        fn spot_price(&self, symbol: &str) -> impl Future<Output = Result<f64, ReadError>> + Send {
            let price = self.0.get(symbol).copied();
            async move { price.ok_or_else(|| ReadError::InvalidInput("unknown".into())) }
        }
    }

    struct SlowSpot;

    impl SpotPriceSource for SlowSpot {
        async fn spot_price(&self, _symbol: &str) -> Result<f64, ReadError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(1.0)
        }
    }

    fn spot(entries: &[(&'static str, f64)]) -> StaticSpot {
        StaticSpot(entries.iter().copied().collect())
    }

    #[tokio::test]
    async fn stable_and_spot_prices_are_exact() {
        let prices = resolve_usd_prices(
            &spot(&[("WETH", 3000.0)]),
            &ValuationSettings::default(),
            "WETH",
            "USDC",
            3000.0,
        )
        .await;
        assert_eq!(
            prices,
            UsdPrices {
                token0: 3000.0,
                token1: 1.0,
                estimated: false
            }
        );
    }

    #[tokio::test]
    async fn fallback_constant_marks_estimate() {
        let settings = ValuationSettings::default().with_fallback_price("ARB", 0.8);
        let prices = resolve_usd_prices(&spot(&[]), &settings, "ARB", "USDC", 0.8).await;
        assert_eq!(prices.token0, 0.8);
        assert!(prices.estimated);
    }

    #[tokio::test]
    async fn missing_side_is_derived_from_pool_price() {
        // Pool says 1 WETH = 100 GMX, so GMX is worth 30 USD.
        let prices = resolve_usd_prices(
            &spot(&[("WETH", 3000.0)]),
            &ValuationSettings::default(),
            "WETH",
            "GMX",
            100.0,
        )
        .await;
        assert_eq!(prices.token0, 3000.0);
        assert!((prices.token1 - 30.0).abs() < 1e-12);
        assert!(prices.estimated);

        let prices = resolve_usd_prices(
            &spot(&[]),
            &ValuationSettings::default(),
            "GMX",
            "USDC",
            25.0,
        )
        .await;
        assert_eq!(prices.token0, 25.0);
        assert!(prices.estimated);
    }

    #[tokio::test]
    async fn unknown_pair_values_at_zero() {
        let prices = resolve_usd_prices(
            &spot(&[]),
            &ValuationSettings::default(),
            "???",
            "FOO",
            0.0,
        )
        .await;
        assert_eq!((prices.token0, prices.token1), (0.0, 0.0));
        assert!(prices.estimated);
    }

    #[tokio::test]
    async fn slow_spot_source_times_out_to_fallback() {
        let settings = ValuationSettings {
            spot_timeout: Duration::from_millis(20),
            ..ValuationSettings::default()
        }
        .with_fallback_price("WETH", 2500.0);

        let prices = resolve_usd_prices(&SlowSpot, &settings, "WETH", "USDC", 2500.0).await;
        assert_eq!(prices.token0, 2500.0);
        assert_eq!(prices.token1, 1.0);
        assert!(prices.estimated);
    }
}

//! Display orientation of a pair.
//!
//! Pool prices are always token1 per token0, and token order is fixed by the
//! token addresses. When token0 is the quote asset (e.g. USDC/WETH) the raw
//! price reads as "WETH per USDC", which is the opposite of how traders quote
//! it. Normalizing flips the pair so prices are quote per base.
//!
//! Flipping a range is swap-then-invert: `low' = 1/high`, `high' = 1/low`.
//! Inverting without swapping leaves `low' > high'`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Symbols treated as quote assets when nothing else is configured.
pub const DEFAULT_STABLE_SYMBOLS: &[&str] = &[
    "USDC", "USDT", "DAI", "USDC.E", "USDBC", "FRAX", "LUSD", "TUSD", "USDE", "PYUSD", "GUSD",
];

/// Decides whether a token is the "price unit" of a pair.
pub trait QuoteClassifier {
    fn is_quote(&self, symbol: &str) -> bool;
}

impl<F> QuoteClassifier for F
where
    F: Fn(&str) -> bool,
{
    fn is_quote(&self, symbol: &str) -> bool {
        self(symbol)
    }
}

/// Case-insensitive set of quote symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableSymbols {
    symbols: HashSet<String>,
}

impl StableSymbols {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list such as `"USDC,usdt, DAI"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Default for StableSymbols {
    fn default() -> Self {
        Self::new(DEFAULT_STABLE_SYMBOLS)
    }
}

impl QuoteClassifier for StableSymbols {
    fn is_quote(&self, symbol: &str) -> bool {
        self.symbols.contains(&symbol.trim().to_ascii_uppercase())
    }
}

/// Prices of a range in display orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRange {
    /// `"BASE/QUOTE"`; prices are QUOTE per BASE.
    pub pair_label: String,
    pub base: String,
    pub quote: String,
    pub price_low: f64,
    pub price_high: f64,
    pub price_current: f64,
    /// True when token0 was the quote and prices were flipped.
    pub inverted: bool,
}

fn invert(price: f64) -> f64 {
    if price == 0.0 {
        f64::INFINITY
    } else {
        1.0 / price
    }
}

/// Orient a token1-per-token0 range for display.
pub fn normalize<C>(
    symbol0: &str,
    symbol1: &str,
    price_low: f64,
    price_high: f64,
    price_current: f64,
    classifier: &C,
) -> NormalizedRange
where
    C: QuoteClassifier + ?Sized,
{
    if classifier.is_quote(symbol0) {
        NormalizedRange {
            pair_label: format!("{symbol1}/{symbol0}"),
            base: symbol1.to_string(),
            quote: symbol0.to_string(),
            price_low: invert(price_high),
            price_high: invert(price_low),
            price_current: invert(price_current),
            inverted: true,
        }
    } else {
        NormalizedRange {
            pair_label: format!("{symbol0}/{symbol1}"),
            base: symbol0.to_string(),
            quote: symbol1.to_string(),
            price_low,
            price_high,
            price_current,
            inverted: false,
        }
    }
}

/// Back to token1-per-token0 `(low, high, current)`.
pub fn denormalize(range: &NormalizedRange) -> (f64, f64, f64) {
    if range.inverted {
        (
            invert(range.price_high),
            invert(range.price_low),
            invert(range.price_current),
        )
    } else {
        (range.price_low, range.price_high, range.price_current)
    }
}

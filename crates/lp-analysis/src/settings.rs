//! Valuation settings: quote symbols, USD fallbacks and spot lookup bounds.

use std::collections::HashMap;
use std::time::Duration;

use lp_data::spot::underlying_symbol;
use lp_math::StableSymbols;
use tracing::warn;

const DEFAULT_SPOT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SPOT_TTL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ValuationSettings {
    /// Symbols priced at 1 USD and used as the quote side of a pair.
    pub stable_symbols: StableSymbols,
    /// USD prices used when the spot lookup fails, keyed by upper-cased symbol.
    pub fallback_prices: HashMap<String, f64>,
    /// Bound on a single spot lookup.
    pub spot_timeout: Duration,
    /// How long a fetched spot price is reused.
    pub spot_ttl: Duration,
}

impl Default for ValuationSettings {
    fn default() -> Self {
        Self {
            stable_symbols: StableSymbols::default(),
            fallback_prices: HashMap::new(),
            spot_timeout: Duration::from_secs(DEFAULT_SPOT_TIMEOUT_SECS),
            spot_ttl: Duration::from_secs(DEFAULT_SPOT_TTL_SECS),
        }
    }
}

impl ValuationSettings {
    /// Defaults overlaid with `LPV_STABLE_SYMBOLS`, `LPV_FALLBACK_PRICES`
    /// (`"ETH=3000,ARB=0.9"`), `LPV_SPOT_TIMEOUT_SECS` and `LPV_SPOT_TTL_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(list) = lookup("LPV_STABLE_SYMBOLS") {
            let symbols = StableSymbols::parse(&list);
            if symbols.is_empty() {
                warn!("LPV_STABLE_SYMBOLS is empty; keeping the default set");
            } else {
                settings.stable_symbols = symbols;
            }
        }
        if let Some(list) = lookup("LPV_FALLBACK_PRICES") {
            settings.fallback_prices = parse_fallback_prices(&list);
        }
        if let Some(secs) = lookup("LPV_SPOT_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            settings.spot_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = lookup("LPV_SPOT_TTL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            settings.spot_ttl = Duration::from_secs(secs);
        }

        settings
    }

    /// Caller-supplied USD price for `symbol`, if any.
    ///
    /// Wrapped tokens fall back to their underlying's entry, so `ETH=3000`
    /// also prices `WETH`. An explicit `WETH=` entry wins.
    pub fn fallback_price(&self, symbol: &str) -> Option<f64> {
        let upper = symbol.trim().to_ascii_uppercase();
        self.fallback_prices.get(&upper).copied().or_else(|| {
            underlying_symbol(&upper).and_then(|underlying| self.fallback_prices.get(underlying).copied())
        })
    }

    pub fn with_fallback_price(mut self, symbol: &str, price: f64) -> Self {
        self.fallback_prices
            .insert(symbol.trim().to_ascii_uppercase(), price);
        self
    }
}

/// Parse `SYMBOL=price` pairs separated by commas; malformed entries are skipped.
pub fn parse_fallback_prices(list: &str) -> HashMap<String, f64> {
    list.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let parsed = entry.split_once('=').and_then(|(symbol, price)| {
                let price = price.trim().parse::<f64>().ok()?;
                let symbol = symbol.trim().to_ascii_uppercase();
                (!symbol.is_empty() && price.is_finite() && price > 0.0).then_some((symbol, price))
            });
            if parsed.is_none() {
                warn!(entry, "ignoring malformed fallback price");
            }
            parsed
        })
        .collect()
}

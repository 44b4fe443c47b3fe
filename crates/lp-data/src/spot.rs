//! # Spot USD prices
//!
//! Latest price from the Binance public market-data endpoint
//! (`data-api.binance.vision`), which needs no API key. A token symbol maps to
//! the `<BASE>USDT` ticker; wrapped assets use their underlying (`WETH` is
//! priced as `ETH`).
//!
//! Lookups are optional enrichment: callers must keep a fallback price for
//! when this fails or times out.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cache::PriceCache;
use crate::error::ReadError;

/// Binance public market-data base URL (no API key required).
const BINANCE_BASE_URL: &str = "https://data-api.binance.vision";

/// Quote asset of every ticker looked up.
const QUOTE_ASSET: &str = "USDT";

/// Wrapped or bridged symbols priced as their underlying asset.
const ALIASES: &[(&str, &str)] = &[
    ("WETH", "ETH"),
    ("WETH.E", "ETH"),
    ("WBTC", "BTC"),
    ("WBTC.E", "BTC"),
    ("WMATIC", "MATIC"),
    ("WBNB", "BNB"),
    ("WAVAX", "AVAX"),
];

/// USD price source by token symbol.
pub trait SpotPriceSource: Send + Sync {
    fn spot_price(&self, symbol: &str) -> impl Future<Output = Result<f64, ReadError>> + Send;
}

/// Underlying asset of a wrapped or bridged symbol (`"weth"` -> `"ETH"`).
pub fn underlying_symbol(symbol: &str) -> Option<&'static str> {
    let upper = symbol.trim().to_ascii_uppercase();
    ALIASES
        .iter()
        .find(|(wrapped, _)| *wrapped == upper)
        .map(|&(_, underlying)| underlying)
}

/// Binance ticker symbol for a token symbol, e.g. `"weth"` -> `"ETHUSDT"`.
///
/// Returns `None` for an empty symbol or the quote asset itself.
pub fn ticker_symbol(symbol: &str) -> Option<String> {
    let upper = symbol.trim().to_ascii_uppercase();
    if upper.is_empty() || upper == QUOTE_ASSET {
        return None;
    }
    let base = underlying_symbol(&upper).unwrap_or(upper.as_str());
    Some(format!("{base}{QUOTE_ASSET}"))
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// Parse a `/api/v3/ticker/price` body: `{"symbol":"ETHUSDT","price":"3587.42"}`.
fn parse_ticker(body: &str) -> Option<f64> {
    let ticker: TickerPrice = serde_json::from_str(body).ok()?;
    ticker
        .price
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price > 0.0)
}

/// Binance spot prices with a TTL cache in front.
#[derive(Debug)]
pub struct BinanceSpot {
    client: reqwest::Client,
    base_url: String,
    cache: PriceCache,
}

impl BinanceSpot {
    /// # Errors
    /// Returns [`ReadError::InvalidInput`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, ttl: Duration) -> Result<Self, ReadError> {
        Self::with_base_url(BINANCE_BASE_URL, timeout, ttl)
    }

    /// Point at another Binance-compatible host.
    ///
    /// # Errors
    /// Returns [`ReadError::InvalidInput`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, timeout: Duration, ttl: Duration) -> Result<Self, ReadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReadError::InvalidInput(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: PriceCache::new(ttl),
        })
    }

    async fn fetch(&self, ticker: &str) -> Result<f64, ReadError> {
        const METHOD: &str = "binance ticker";
        let url = format!("{}/api/v3/ticker/price?symbol={ticker}", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReadError::network(METHOD, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReadError::network(
                METHOD,
                format!("HTTP {} for {ticker}", status.as_u16()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReadError::network(METHOD, format!("failed to read body: {e}")))?;

        parse_ticker(&body).ok_or_else(|| ReadError::decode("binance ticker", format!("unexpected body for {ticker}")))
    }
}

impl SpotPriceSource for BinanceSpot {
    #[tracing::instrument(skip(self))]
    async fn spot_price(&self, symbol: &str) -> Result<f64, ReadError> {
        let ticker = ticker_symbol(symbol)
            .ok_or_else(|| ReadError::InvalidInput(format!("no spot ticker for '{symbol}'")))?;

        if let Some(price) = self.cache.get(&ticker) {
            return Ok(price);
        }

        let price = self.fetch(&ticker).await?;
        debug!(ticker = ticker.as_str(), price, "spot price fetched");
        self.cache.insert(&ticker, price);
        Ok(price)
    }
}

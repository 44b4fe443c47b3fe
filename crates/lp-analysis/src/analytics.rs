//! Return figures against a user-supplied deposit basis.
//!
//! ```text
//! ROI  = (value + fees - deposit) / deposit × 100
//! APR  = fees / deposit / days × 365 × 100
//! IL   = (value - hodl) / hodl × 100
//! ```
//!
//! `days` is whole calendar days since the position was opened, floored at 1
//! so a same-day position does not divide by zero.

use std::collections::HashMap;

use alloy::primitives::U256;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValuationError;
use crate::pricing::UsdPrices;

/// What the user put in, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositBasis {
    pub deposit_usd: f64,
    pub opened_on: NaiveDate,
    /// Token0 deposited, display units. Enables the HODL comparison.
    #[serde(default)]
    pub amount0: Option<f64>,
    #[serde(default)]
    pub amount1: Option<f64>,
}

impl DepositBasis {
    /// # Errors
    /// Returns [`ValuationError::InvalidBasis`] for negative or non-finite values.
    pub fn validate(&self) -> Result<(), ValuationError> {
        let fields = [
            ("deposit_usd", Some(self.deposit_usd)),
            ("amount0", self.amount0),
            ("amount1", self.amount1),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ValuationError::InvalidBasis(format!(
                        "{name} must be a non-negative number, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Deposit bases keyed by position token id.
pub type BasisBook = HashMap<U256, DepositBasis>;

/// Parse a JSON object of token id (decimal string) to [`DepositBasis`]:
///
/// ```json
/// { "123456": { "deposit_usd": 1500, "opened_on": "2024-05-01" } }
/// ```
///
/// # Errors
/// Returns [`ValuationError::InvalidBasis`] for malformed JSON, a
/// non-numeric id, or a basis that fails [`DepositBasis::validate`].
pub fn parse_basis_book(json: &str) -> Result<BasisBook, ValuationError> {
    let raw: HashMap<String, DepositBasis> = serde_json::from_str(json)
        .map_err(|e| ValuationError::InvalidBasis(format!("malformed basis file: {e}")))?;

    raw.into_iter()
        .map(|(id, basis)| {
            let token_id = U256::from_str_radix(id.trim(), 10)
                .map_err(|_| ValuationError::InvalidBasis(format!("'{id}' is not a position id")))?;
            basis.validate()?;
            Ok((token_id, basis))
        })
        .collect()
}

/// Whole days between `opened_on` and `today`, at least 1.
pub fn elapsed_days(opened_on: NaiveDate, today: NaiveDate) -> i64 {
    (today - opened_on).num_days().max(1)
}

/// `None` when there is no deposit to measure against.
pub fn roi_pct(value_usd: f64, fees_usd: f64, deposit_usd: f64) -> Option<f64> {
    (deposit_usd > 0.0).then(|| (value_usd + fees_usd - deposit_usd) / deposit_usd * 100.0)
}

/// Fee yield annualized over the days open. `None` without a deposit.
pub fn apr_pct(fees_usd: f64, deposit_usd: f64, days: i64) -> Option<f64> {
    (deposit_usd > 0.0).then(|| fees_usd / deposit_usd / days.max(1) as f64 * 365.0 * 100.0)
}

/// Fee run-rate extrapolated from the average so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeeProjection {
    pub daily_usd: f64,
    pub monthly_usd: f64,
    pub yearly_usd: f64,
}

pub fn project_fees(fees_usd: f64, days: i64) -> FeeProjection {
    let daily_usd = fees_usd / days.max(1) as f64;
    FeeProjection {
        daily_usd,
        monthly_usd: daily_usd * 30.0,
        yearly_usd: daily_usd * 365.0,
    }
}

/// Position against simply holding the deposited tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HodlComparison {
    /// Deposited amounts at today's prices.
    pub hodl_usd: f64,
    /// Impermanent loss, excluding fees (negative when the position lags).
    pub il_pct: f64,
    /// `value + fees - hodl`.
    pub net_vs_hodl_usd: f64,
}

/// `None` unless both deposit amounts are known and worth something today.
pub fn compare_hodl(
    basis: &DepositBasis,
    prices: &UsdPrices,
    value_usd: f64,
    fees_usd: f64,
) -> Option<HodlComparison> {
    let hodl_usd = prices.value(basis.amount0?, basis.amount1?);
    (hodl_usd > 0.0).then(|| HodlComparison {
        hodl_usd,
        il_pct: (value_usd - hodl_usd) / hodl_usd * 100.0,
        net_vs_hodl_usd: value_usd + fees_usd - hodl_usd,
    })
}

/// Everything derived from a deposit basis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionAnalytics {
    pub days_open: i64,
    pub roi_pct: Option<f64>,
    pub apr_pct: Option<f64>,
    pub projection: FeeProjection,
    pub hodl: Option<HodlComparison>,
}

pub fn analyze(
    basis: &DepositBasis,
    today: NaiveDate,
    prices: &UsdPrices,
    value_usd: f64,
    fees_usd: f64,
) -> PositionAnalytics {
    let days_open = elapsed_days(basis.opened_on, today);
    PositionAnalytics {
        days_open,
        roi_pct: roi_pct(value_usd, fees_usd, basis.deposit_usd),
        apr_pct: apr_pct(fees_usd, basis.deposit_usd, days_open),
        projection: project_fees(fees_usd, days_open),
        hodl: compare_hodl(basis, prices, value_usd, fees_usd),
    }
}

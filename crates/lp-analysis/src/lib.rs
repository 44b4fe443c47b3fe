//! lp-analysis: valuation of concentrated-liquidity positions.
//!
//! Combines chain snapshots from `lp-data` with the math in `lp-math` into
//! per-position reports: token amounts, unclaimed fees, USD value, display
//! prices, ROI/APR against a deposit basis and range-exit scenarios.

pub mod analytics;
pub mod error;
pub mod pipeline;
pub mod pricing;
pub mod refresh;
pub mod settings;
pub mod valuation;

pub use analytics::{
    parse_basis_book, BasisBook, DepositBasis, FeeProjection, HodlComparison, PositionAnalytics,
};
pub use error::ValuationError;
pub use pipeline::{PositionOutcome, Valuator, WalletSummary, WalletValuation};
pub use pricing::{resolve_usd_prices, UsdPrices};
pub use refresh::Refresher;
pub use settings::ValuationSettings;
pub use valuation::{value_position, ExitScenario, ExitScenarios, PositionReport};

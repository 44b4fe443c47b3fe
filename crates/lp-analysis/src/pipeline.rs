//! One valuation pass over a wallet: read, price, value, summarize.

use alloy::primitives::Address;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use lp_data::{PositionRead, ReadOrchestrator, ReadStats, ReadTransport, SpotPriceSource};
use serde::Serialize;
use tracing::{info, warn};

use crate::analytics::BasisBook;
use crate::error::ValuationError;
use crate::pricing::resolve_usd_prices;
use crate::settings::ValuationSettings;
use crate::valuation::{current_price, value_position, PositionReport};

/// Result for one position of the wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PositionOutcome {
    Valued(Box<PositionReport>),
    /// Its reads or its math failed; the rest of the wallet is unaffected.
    Unavailable { id: String, reason: String },
}

impl PositionOutcome {
    pub fn report(&self) -> Option<&PositionReport> {
        match self {
            Self::Valued(report) => Some(report),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Totals over one pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WalletSummary {
    pub positions: usize,
    pub valued: usize,
    pub in_range: usize,
    pub out_of_range: usize,
    pub unavailable: usize,
    pub empty: usize,
    pub degraded_fees: usize,
    pub estimated_prices: usize,
    pub total_value_usd: f64,
    pub total_fees_usd: f64,
}

impl WalletSummary {
    pub fn from_outcomes(outcomes: &[PositionOutcome]) -> Self {
        let mut summary = Self {
            positions: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            let Some(report) = outcome.report() else {
                summary.unavailable += 1;
                continue;
            };
            summary.valued += 1;
            if report.is_empty {
                summary.empty += 1;
            } else if report.in_range {
                summary.in_range += 1;
            } else {
                summary.out_of_range += 1;
            }
            summary.degraded_fees += usize::from(report.fees_degraded);
            summary.estimated_prices += usize::from(report.prices_estimated);
            summary.total_value_usd += report.value_usd;
            summary.total_fees_usd += report.fees_usd;
        }
        summary
    }

    pub fn total_usd(&self) -> f64 {
        self.total_value_usd + self.total_fees_usd
    }
}

/// Everything produced by one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletValuation {
    /// Checksummed owner address.
    pub owner: String,
    pub generated_at: DateTime<Utc>,
    pub positions: Vec<PositionOutcome>,
    pub summary: WalletSummary,
    /// Transport round trips issued for the chain reads.
    pub batches: usize,
    pub rpc_calls: usize,
}

/// Values every position of a wallet.
pub struct Valuator<T, S> {
    reader: ReadOrchestrator<T>,
    spot: S,
    settings: ValuationSettings,
}

impl<T, S> Valuator<T, S>
where
    T: ReadTransport,
    S: SpotPriceSource,
{
    pub fn new(reader: ReadOrchestrator<T>, spot: S, settings: ValuationSettings) -> Self {
        Self {
            reader,
            spot,
            settings,
        }
    }

    pub fn reader(&self) -> &ReadOrchestrator<T> {
        &self.reader
    }

    pub fn settings(&self) -> &ValuationSettings {
        &self.settings
    }

    /// Read and value all positions of `owner`.
    ///
    /// Positions are valued concurrently once the chain reads are done. A
    /// position whose reads or math fail is reported unavailable.
    ///
    /// # Errors
    /// Fails the whole pass only when the wallet cannot be enumerated or the
    /// basis book is invalid.
    #[tracing::instrument(skip_all, fields(owner = %owner))]
    pub async fn value_wallet(
        &self,
        owner: Address,
        basis: &BasisBook,
        today: NaiveDate,
    ) -> Result<WalletValuation, ValuationError> {
        for entry in basis.values() {
            entry.validate()?;
        }

        let wallet = self.reader.read_wallet(owner).await?;
        let outcomes = join_all(
            wallet
                .positions
                .iter()
                .map(|read| self.value_read(read, basis, today)),
        )
        .await;

        let summary = WalletSummary::from_outcomes(&outcomes);
        let ReadStats { batches, calls, .. } = wallet.stats;
        info!(
            positions = summary.positions,
            valued = summary.valued,
            unavailable = summary.unavailable,
            total_usd = summary.total_usd(),
            batches,
            "wallet valued"
        );

        Ok(WalletValuation {
            owner: owner.to_checksum(None),
            generated_at: Utc::now(),
            positions: outcomes,
            summary,
            batches,
            rpc_calls: calls,
        })
    }

    async fn value_read(
        &self,
        read: &PositionRead,
        basis: &BasisBook,
        today: NaiveDate,
    ) -> PositionOutcome {
        let snapshot = match read {
            PositionRead::Ready(snapshot) => snapshot,
            PositionRead::Unavailable { token_id, reason } => {
                return PositionOutcome::Unavailable {
                    id: token_id.to_string(),
                    reason: reason.clone(),
                };
            }
        };
        let token_id = snapshot.position.token_id;

        let pool_price = match current_price(snapshot) {
            Ok(price) => price,
            Err(e) => {
                warn!(%token_id, error = %e, "pool price unusable");
                return PositionOutcome::Unavailable {
                    id: token_id.to_string(),
                    reason: e.to_string(),
                };
            }
        };

        let prices = resolve_usd_prices(
            &self.spot,
            &self.settings,
            &snapshot.token0.symbol,
            &snapshot.token1.symbol,
            pool_price,
        )
        .await;

        match value_position(
            snapshot,
            &prices,
            basis.get(&token_id),
            today,
            &self.settings.stable_symbols,
        ) {
            Ok(report) => PositionOutcome::Valued(Box::new(report)),
            Err(e) => {
                warn!(%token_id, error = %e, "position valuation failed");
                PositionOutcome::Unavailable {
                    id: token_id.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

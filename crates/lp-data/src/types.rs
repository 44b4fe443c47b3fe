//! Snapshots produced by the read orchestrator.
//!
//! Everything here is fetched fresh per request and never mutated afterwards.

use alloy::primitives::{Address, U256};
use lp_math::{FeeGrowth, PoolFeeGrowth, PositionFees};

/// Symbol shown for tokens whose metadata could not be read.
pub const UNKNOWN_SYMBOL: &str = "???";

/// Decimals assumed for tokens whose metadata could not be read.
pub const FALLBACK_DECIMALS: u8 = 18;

/// Raw position record from the position manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRecord {
    pub token_id: U256,
    pub token0: Address,
    pub token1: Address,
    /// Fee tier in hundredths of a basis point (500, 3000, 10000, ...).
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub fee_growth_inside_last: FeeGrowth,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

impl PositionRecord {
    /// Position-side inputs of fee accounting.
    pub fn fee_state(&self) -> PositionFees {
        PositionFees {
            liquidity: self.liquidity,
            tick_lower: self.tick_lower,
            tick_upper: self.tick_upper,
            fee_growth_inside_last: self.fee_growth_inside_last,
            tokens_owed0: self.tokens_owed0,
            tokens_owed1: self.tokens_owed1,
        }
    }

    /// Closed or fully withdrawn: holds no liquidity.
    pub fn is_empty(&self) -> bool {
        self.liquidity == 0
    }
}

/// ERC-20 symbol and decimals. Immutable for a given token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMeta {
    /// Placeholder used when `symbol()`/`decimals()` are unreadable.
    pub fn unknown(address: Address) -> Self {
        Self {
            address,
            symbol: UNKNOWN_SYMBOL.to_string(),
            decimals: FALLBACK_DECIMALS,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.symbol == UNKNOWN_SYMBOL
    }
}

/// Live pool state relevant to one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub address: Address,
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

/// Everything needed to value one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub position: PositionRecord,
    pub token0: TokenMeta,
    pub token1: TokenMeta,
    pub pool: PoolState,
    /// `None` in owed-only mode or when the fee-growth globals were unreadable.
    pub fee_growth: Option<PoolFeeGrowth>,
}

/// Outcome of reading one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionRead {
    Ready(Box<PositionSnapshot>),
    /// A read this position depends on failed; other positions are unaffected.
    Unavailable { token_id: U256, reason: String },
}

impl PositionRead {
    pub fn token_id(&self) -> U256 {
        match self {
            Self::Ready(snapshot) => snapshot.position.token_id,
            Self::Unavailable { token_id, .. } => *token_id,
        }
    }

    pub fn snapshot(&self) -> Option<&PositionSnapshot> {
        match self {
            Self::Ready(snapshot) => Some(snapshot),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Counters for one wallet read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadStats {
    /// Transport round trips issued (`call_many` invocations, retries included).
    pub batches: usize,
    /// Individual reads requested across all batches.
    pub calls: usize,
    pub retries: usize,
    /// Token metadata served from the cache instead of the chain.
    pub metadata_cache_hits: usize,
}

/// All positions of one wallet, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletRead {
    pub owner: Address,
    pub positions: Vec<PositionRead>,
    pub stats: ReadStats,
}

//! Chain read configuration.
//!
//! Defaults target Arbitrum One. Every field can be overridden from the
//! environment (`LPV_*`), and the CLI overrides the environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{address, Address};

use crate::error::ReadError;

/// Public Arbitrum One RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://arb1.arbitrum.io/rpc";

/// Uniswap V3 NonfungiblePositionManager.
pub const POSITION_MANAGER: Address = address!("C36442b4a4522E871399CD717aBDD847Ab11FE88");

/// Uniswap V3 factory.
pub const FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");

/// Multicall3.
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_BATCH_SIZE: usize = 200;

/// How unclaimed fees are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeeMode {
    /// Read pool fee-growth counters and compute accrued fees.
    #[default]
    Exact,
    /// Report only `tokensOwed`; skips the per-tick reads.
    OwedOnly,
}

impl FromStr for FeeMode {
    type Err = ReadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "owed" | "owed-only" | "owed_only" => Ok(Self::OwedOnly),
            other => Err(ReadError::InvalidInput(format!(
                "unknown fee mode '{other}' (expected 'exact' or 'owed')"
            ))),
        }
    }
}

impl fmt::Display for FeeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::OwedOnly => write!(f, "owed"),
        }
    }
}

/// Where and how to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub position_manager: Address,
    pub factory: Address,
    pub multicall: Address,
    /// Per-request timeout; no read blocks longer than this.
    pub timeout: Duration,
    /// Pause before the single retry of a failed phase.
    pub retry_backoff: Duration,
    /// Aggregate each phase through Multicall3 instead of one `eth_call` per read.
    pub batching: bool,
    /// Maximum reads per aggregated call.
    pub batch_size: usize,
    pub fee_mode: FeeMode,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            position_manager: POSITION_MANAGER,
            factory: FACTORY,
            multicall: MULTICALL3,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            batching: true,
            batch_size: DEFAULT_BATCH_SIZE,
            fee_mode: FeeMode::Exact,
        }
    }
}

impl ChainConfig {
    /// Defaults overlaid with `LPV_*` environment variables.
    ///
    /// # Errors
    /// Returns [`ReadError::InvalidInput`] for a malformed address, fee mode or
    /// batch size. Unparseable durations and flags fall back to defaults.
    pub fn from_env() -> Result<Self, ReadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ChainConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("LPV_RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(value) = lookup("LPV_POSITION_MANAGER") {
            config.position_manager = parse_address(&value)?;
        }
        if let Some(value) = lookup("LPV_FACTORY") {
            config.factory = parse_address(&value)?;
        }
        if let Some(value) = lookup("LPV_MULTICALL") {
            config.multicall = parse_address(&value)?;
        }
        if let Some(secs) = lookup("LPV_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = lookup("LPV_RETRY_BACKOFF_MS").and_then(|v| v.parse::<u64>().ok()) {
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(value) = lookup("LPV_BATCHING") {
            config.batching = !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        if let Some(value) = lookup("LPV_BATCH_SIZE") {
            config.batch_size = value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| {
                    ReadError::InvalidInput(format!("LPV_BATCH_SIZE must be a positive integer, got '{value}'"))
                })?;
        }
        if let Some(value) = lookup("LPV_FEE_MODE") {
            config.fee_mode = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no read could succeed with.
    ///
    /// # Errors
    /// Returns [`ReadError::InvalidInput`] for a non-HTTP RPC URL, a zero timeout
    /// or a zero batch size.
    pub fn validate(&self) -> Result<(), ReadError> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(ReadError::InvalidInput(format!(
                "rpc url must be http(s), got '{}'",
                self.rpc_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ReadError::InvalidInput("timeout must be non-zero".into()));
        }
        if self.batch_size == 0 {
            return Err(ReadError::InvalidInput("batch size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Parse a `0x`-prefixed 20-byte hex address.
///
/// # Errors
/// Returns [`ReadError::InvalidInput`] for anything else.
pub fn parse_address(value: &str) -> Result<Address, ReadError> {
    let trimmed = value.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(ReadError::InvalidInput(format!(
            "'{trimmed}' is not a 0x-prefixed 20-byte address"
        )));
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| ReadError::InvalidInput(format!("'{trimmed}' is not a valid address: {e}")))
}

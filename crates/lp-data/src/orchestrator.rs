//! Batched, phase-ordered reads of a wallet's positions.
//!
//! Four phases, each built from the results of the one before:
//!
//! 1. **Enumerate** - `balanceOf(owner)`, then `tokenOfOwnerByIndex` for every index.
//! 2. **Records** - `positions(id)` per id.
//! 3. **Metadata** - `symbol()`/`decimals()` per distinct uncached token, plus
//!    `getPool(token0, token1, fee)` per position.
//! 4. **Pool state** - `slot0()` per distinct pool; in exact fee mode also the
//!    fee-growth globals per pool and `ticks(t)` per distinct `(pool, tick)`.
//!
//! Each phase is handed to the transport as one list, so with batching on a
//! wallet costs a handful of round trips regardless of its size. A phase that
//! fails at the transport level is retried once after a backoff; when only
//! some calls were lost, only those are re-sent. Phase 1 failing fails the
//! request; a later phase failing marks only the positions that depend on it
//! as unavailable. A call that reverts is not retried: token metadata falls
//! back to a placeholder, fee growth to owed-only.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::aliases::U24;
use alloy::primitives::{Address, U256};
use lp_math::tick_math::{check_range, check_tick};
use lp_math::{FeeGrowth, PoolFeeGrowth, TickFeeGrowth};
use tracing::{debug, info, warn};

use crate::abi::{
    IERC20Metadata, IERC20SymbolBytes32, INonfungiblePositionManager, IUniswapV3Factory,
    IUniswapV3Pool,
};
use crate::cache::MetadataCache;
use crate::config::{ChainConfig, FeeMode};
use crate::error::ReadError;
use crate::transport::{CallKind, CallOutcome, CallRequest, ReadTransport};
use crate::types::{
    PoolState, PositionRead, PositionRecord, PositionSnapshot, ReadStats, TokenMeta, WalletRead,
    FALLBACK_DECIMALS, UNKNOWN_SYMBOL,
};

/// Upper bound on positions enumerated per wallet.
const MAX_POSITIONS: u64 = 10_000;

/// Read phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enumerate,
    Records,
    Metadata,
    PoolState,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enumerate => "enumerate",
            Self::Records => "records",
            Self::Metadata => "metadata",
            Self::PoolState => "pool_state",
        };
        f.write_str(name)
    }
}

/// A position still moving through the phases.
struct Pending {
    record: PositionRecord,
    pool: Address,
}

/// Per-position progress: `Err` holds the reason it became unavailable.
type Slot = (U256, Result<Pending, String>);

/// Reads wallets through a [`ReadTransport`].
pub struct ReadOrchestrator<T> {
    transport: T,
    position_manager: Address,
    factory: Address,
    fee_mode: FeeMode,
    retry_backoff: Duration,
    metadata: Arc<MetadataCache>,
}

impl<T: ReadTransport> ReadOrchestrator<T> {
    pub fn new(transport: T, config: &ChainConfig, metadata: Arc<MetadataCache>) -> Self {
        Self {
            transport,
            position_manager: config.position_manager,
            factory: config.factory,
            fee_mode: config.fee_mode,
            retry_backoff: config.retry_backoff,
            metadata,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn metadata_cache(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    pub fn fee_mode(&self) -> FeeMode {
        self.fee_mode
    }

    /// Read every position owned by `owner`.
    ///
    /// # Errors
    /// Fails only when the wallet cannot be enumerated (phase 1). Failures in
    /// later phases surface as [`PositionRead::Unavailable`] entries.
    #[tracing::instrument(skip_all, fields(owner = %owner))]
    pub async fn read_wallet(&self, owner: Address) -> Result<WalletRead, ReadError> {
        let mut stats = ReadStats::default();

        let token_ids = self.enumerate(owner, &mut stats).await?;
        let mut slots = if token_ids.is_empty() {
            Vec::new()
        } else {
            self.read_records(&token_ids, &mut stats).await
        };

        let pending_count = slots.iter().filter(|(_, slot)| slot.is_ok()).count();
        let positions = if pending_count == 0 {
            finish_unavailable(slots)
        } else {
            let metadata = self.read_metadata(&mut slots, &mut stats).await;
            self.read_pool_state(slots, &metadata, &mut stats).await
        };

        let unavailable = positions
            .iter()
            .filter(|read| read.snapshot().is_none())
            .count();
        info!(
            positions = positions.len(),
            unavailable,
            batches = stats.batches,
            calls = stats.calls,
            "wallet read complete"
        );

        Ok(WalletRead {
            owner,
            positions,
            stats,
        })
    }

    /// Hand one phase to the transport, retrying once on a transport failure.
    ///
    /// A round trip that failed outright is repeated whole. Otherwise only the
    /// [`CallOutcome::Failed`] slots are re-sent; any still failing after that
    /// stay `Failed` for the caller to turn into unavailable positions.
    async fn run_phase(
        &self,
        phase: Phase,
        calls: &[CallRequest],
        stats: &mut ReadStats,
    ) -> Result<Vec<CallOutcome>, ReadError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        stats.batches += 1;
        stats.calls += calls.len();
        let (mut outcomes, retried) = match self.transport.call_many(calls).await {
            Err(error) if error.is_retryable() => {
                self.back_off(phase, &error, calls.len(), stats).await;
                (self.transport.call_many(calls).await?, true)
            }
            other => (other?, false),
        };
        check_len(phase, calls.len(), outcomes.len())?;

        let failed: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.failure().is_some())
            .map(|(index, _)| index)
            .collect();
        if !retried && !failed.is_empty() {
            if let Some(error) = outcomes[failed[0]].failure().cloned() {
                self.back_off(phase, &error, failed.len(), stats).await;
            }
            let resend: Vec<CallRequest> = failed.iter().map(|&index| calls[index].clone()).collect();
            match self.transport.call_many(&resend).await {
                Ok(again) if again.len() == resend.len() => {
                    for (index, outcome) in failed.into_iter().zip(again) {
                        outcomes[index] = outcome;
                    }
                }
                Ok(again) => warn!(
                    phase = %phase,
                    expected = resend.len(),
                    got = again.len(),
                    "retry returned a misaligned batch"
                ),
                Err(error) => warn!(phase = %phase, error = %error, "retry failed"),
            }
        }

        let missing = outcomes.iter().filter(|o| !o.is_available()).count();
        let failed = outcomes.iter().filter(|o| o.failure().is_some()).count();
        debug!(phase = %phase, calls = calls.len(), missing, failed, "phase complete");
        Ok(outcomes)
    }

    async fn back_off(&self, phase: Phase, error: &ReadError, calls: usize, stats: &mut ReadStats) {
        warn!(
            phase = %phase,
            error = %error,
            calls,
            backoff_ms = self.retry_backoff.as_millis() as u64,
            "reads failed, retrying once"
        );
        tokio::time::sleep(self.retry_backoff).await;
        stats.batches += 1;
        stats.retries += 1;
    }

    /// Phase 1: wallet -> position ids.
    async fn enumerate(&self, owner: Address, stats: &mut ReadStats) -> Result<Vec<U256>, ReadError> {
        let count_call = [CallRequest::new(
            self.position_manager,
            &INonfungiblePositionManager::balanceOfCall { owner },
            CallKind::BalanceOf,
        )];
        let outcomes = self.run_phase(Phase::Enumerate, &count_call, stats).await?;
        fail_on_lost(&outcomes)?;
        let balance = outcomes
            .first()
            .and_then(|o| o.decode::<INonfungiblePositionManager::balanceOfCall>())
            .ok_or_else(|| ReadError::decode("balanceOf", "position count unavailable"))?
            .balance;
        if balance > U256::from(MAX_POSITIONS) {
            return Err(ReadError::decode(
                "balanceOf",
                format!("implausible position count {balance}"),
            ));
        }
        let count = balance.to::<u64>() as usize;

        if count == 0 {
            debug!("wallet holds no positions");
            return Ok(Vec::new());
        }

        let index_calls: Vec<CallRequest> = (0..count)
            .map(|index| {
                CallRequest::new(
                    self.position_manager,
                    &INonfungiblePositionManager::tokenOfOwnerByIndexCall {
                        owner,
                        index: U256::from(index),
                    },
                    CallKind::TokenOfOwnerByIndex,
                )
            })
            .collect();
        let outcomes = self.run_phase(Phase::Enumerate, &index_calls, stats).await?;
        fail_on_lost(&outcomes)?;

        let mut token_ids = Vec::with_capacity(count);
        for (index, outcome) in outcomes.iter().enumerate() {
            match outcome.decode::<INonfungiblePositionManager::tokenOfOwnerByIndexCall>() {
                Some(decoded) => token_ids.push(decoded.tokenId),
                None => warn!(index, "position id unavailable; skipping"),
            }
        }
        Ok(token_ids)
    }

    /// Phase 2: position ids -> raw records.
    async fn read_records(&self, token_ids: &[U256], stats: &mut ReadStats) -> Vec<Slot> {
        let calls: Vec<CallRequest> = token_ids
            .iter()
            .map(|token_id| {
                CallRequest::new(
                    self.position_manager,
                    &INonfungiblePositionManager::positionsCall { tokenId: *token_id },
                    CallKind::Positions,
                )
            })
            .collect();

        let outcomes = match self.run_phase(Phase::Records, &calls, stats).await {
            Ok(outcomes) => outcomes,
            Err(error) => {
                warn!(error = %error, "position records unavailable");
                return token_ids
                    .iter()
                    .map(|id| (*id, Err(format!("position record read failed: {error}"))))
                    .collect();
            }
        };

        token_ids
            .iter()
            .zip(&outcomes)
            .map(|(token_id, outcome)| {
                let record = decode_record(*token_id, outcome).map(|record| Pending {
                    record,
                    pool: Address::ZERO,
                });
                if let Err(reason) = &record {
                    debug!(token_id = %token_id, reason = reason.as_str(), "position skipped");
                }
                (*token_id, record)
            })
            .collect()
    }

    /// Phase 3: token metadata for distinct uncached tokens, pool per position.
    ///
    /// Fills in `Pending::pool` or fails the slot. Returns metadata for every
    /// token still referenced.
    async fn read_metadata(
        &self,
        slots: &mut [Slot],
        stats: &mut ReadStats,
    ) -> HashMap<Address, TokenMeta> {
        let mut metadata = HashMap::new();
        let mut missing = Vec::new();
        let mut seen = HashSet::new();
        for (_, slot) in slots.iter() {
            let Ok(pending) = slot else { continue };
            for token in [pending.record.token0, pending.record.token1] {
                if !seen.insert(token) {
                    continue;
                }
                match self.metadata.get(&token) {
                    Some(meta) => {
                        stats.metadata_cache_hits += 1;
                        metadata.insert(token, meta);
                    }
                    None => missing.push(token),
                }
            }
        }

        let mut calls = Vec::with_capacity(missing.len() * 2 + slots.len());
        for token in &missing {
            calls.push(CallRequest::new(*token, &IERC20Metadata::symbolCall {}, CallKind::Symbol));
            calls.push(CallRequest::new(*token, &IERC20Metadata::decimalsCall {}, CallKind::Decimals));
        }
        let mut pool_slots = Vec::new();
        for (index, (_, slot)) in slots.iter().enumerate() {
            let Ok(pending) = slot else { continue };
            calls.push(CallRequest::new(
                self.factory,
                &IUniswapV3Factory::getPoolCall {
                    tokenA: pending.record.token0,
                    tokenB: pending.record.token1,
                    fee: U24::saturating_from(pending.record.fee),
                },
                CallKind::GetPool,
            ));
            pool_slots.push(index);
        }

        let outcomes = match self.run_phase(Phase::Metadata, &calls, stats).await {
            Ok(outcomes) => outcomes,
            Err(error) => {
                warn!(error = %error, "metadata phase failed");
                fail_pending(slots, &format!("token metadata read failed: {error}"));
                return metadata;
            }
        };

        let (meta_outcomes, pool_outcomes) = outcomes.split_at(missing.len() * 2);
        let mut lost_tokens: HashMap<Address, String> = HashMap::new();
        for (token, pair) in missing.iter().zip(meta_outcomes.chunks(2)) {
            if let Some(error) = pair[0].failure().or(pair[1].failure()) {
                warn!(token = %token, error = %error, "token metadata lost in transit");
                lost_tokens.insert(*token, format!("token metadata read failed for {token}: {error}"));
                continue;
            }
            let symbol = decode_symbol(&pair[0]);
            let decimals = pair[1]
                .decode::<IERC20Metadata::decimalsCall>()
                .map(|decoded| decoded.decimals);
            let meta = match (symbol, decimals) {
                (Some(symbol), Some(decimals)) => {
                    let meta = TokenMeta {
                        address: *token,
                        symbol,
                        decimals,
                    };
                    self.metadata.insert(meta.clone());
                    meta
                }
                (symbol, decimals) => {
                    warn!(token = %token, "token metadata unavailable; using placeholder");
                    TokenMeta {
                        address: *token,
                        symbol: symbol.unwrap_or_else(|| UNKNOWN_SYMBOL.to_string()),
                        decimals: decimals.unwrap_or(FALLBACK_DECIMALS),
                    }
                }
            };
            metadata.insert(*token, meta);
        }

        for (index, outcome) in pool_slots.into_iter().zip(pool_outcomes) {
            let (token_id, slot) = &mut slots[index];
            let Ok(pending) = slot.as_mut() else { continue };
            let lost = [pending.record.token0, pending.record.token1]
                .iter()
                .find_map(|token| lost_tokens.get(token).cloned());
            if let Some(reason) = lost {
                *slot = Err(reason);
                continue;
            }
            if let Some(error) = outcome.failure() {
                *slot = Err(format!("pool lookup failed: {error}"));
                continue;
            }
            let pool = outcome
                .decode::<IUniswapV3Factory::getPoolCall>()
                .map(|decoded| decoded.pool)
                .filter(|pool| !pool.is_zero());
            match pool {
                Some(pool) => pending.pool = pool,
                None => {
                    let fee = pending.record.fee;
                    debug!(token_id = %token_id, fee, "pool not found");
                    *slot = Err(format!("no pool for fee tier {fee}"));
                }
            }
        }

        metadata
    }

    /// Phase 4: pool state, then assemble the final reads.
    async fn read_pool_state(
        &self,
        mut slots: Vec<Slot>,
        metadata: &HashMap<Address, TokenMeta>,
        stats: &mut ReadStats,
    ) -> Vec<PositionRead> {
        let exact = self.fee_mode == FeeMode::Exact;

        let mut pools: Vec<Address> = Vec::new();
        let mut ticks: Vec<(Address, i32)> = Vec::new();
        {
            let mut seen_pools = HashSet::new();
            let mut seen_ticks = HashSet::new();
            for (_, slot) in &slots {
                let Ok(pending) = slot else { continue };
                if seen_pools.insert(pending.pool) {
                    pools.push(pending.pool);
                }
                if exact {
                    for tick in [pending.record.tick_lower, pending.record.tick_upper] {
                        if seen_ticks.insert((pending.pool, tick)) {
                            ticks.push((pending.pool, tick));
                        }
                    }
                }
            }
        }

        let per_pool = if exact { 3 } else { 1 };
        let mut calls = Vec::with_capacity(pools.len() * per_pool + ticks.len());
        for pool in &pools {
            calls.push(CallRequest::new(*pool, &IUniswapV3Pool::slot0Call {}, CallKind::Slot0));
            if exact {
                calls.push(CallRequest::new(
                    *pool,
                    &IUniswapV3Pool::feeGrowthGlobal0X128Call {},
                    CallKind::FeeGrowthGlobal0,
                ));
                calls.push(CallRequest::new(
                    *pool,
                    &IUniswapV3Pool::feeGrowthGlobal1X128Call {},
                    CallKind::FeeGrowthGlobal1,
                ));
            }
        }
        let mut tick_calls = Vec::with_capacity(ticks.len());
        for (pool, tick) in &ticks {
            match alloy::primitives::aliases::I24::try_from(*tick) {
                Ok(encoded) => {
                    calls.push(CallRequest::new(
                        *pool,
                        &IUniswapV3Pool::ticksCall { tick: encoded },
                        CallKind::Ticks,
                    ));
                    tick_calls.push((*pool, *tick));
                }
                Err(_) => debug!(tick, "tick outside int24; skipping fee-growth read"),
            }
        }

        let outcomes = match self.run_phase(Phase::PoolState, &calls, stats).await {
            Ok(outcomes) => outcomes,
            Err(error) => {
                warn!(error = %error, "pool state phase failed");
                fail_pending(&mut slots, &format!("pool state read failed: {error}"));
                return finish_unavailable(slots);
            }
        };

        let (pool_outcomes, tick_outcomes) = outcomes.split_at(pools.len() * per_pool);
        let mut states: HashMap<Address, (Result<PoolState, String>, Option<FeeGrowth>)> = HashMap::new();
        for (pool, group) in pools.iter().zip(pool_outcomes.chunks(per_pool)) {
            let state = match group[0].failure() {
                Some(error) => Err(format!("pool state read failed: {error}")),
                None => decode_slot0(*pool, &group[0]).ok_or_else(|| format!("pool {pool} state unavailable")),
            };
            let global = if exact {
                let growth0 = group[1].decode::<IUniswapV3Pool::feeGrowthGlobal0X128Call>();
                let growth1 = group[2].decode::<IUniswapV3Pool::feeGrowthGlobal1X128Call>();
                match (growth0, growth1) {
                    (Some(g0), Some(g1)) => Some(FeeGrowth::new(g0.growth, g1.growth)),
                    _ => {
                        warn!(pool = %pool, "fee growth globals unavailable; fees fall back to owed-only");
                        None
                    }
                }
            } else {
                None
            };
            states.insert(*pool, (state, global));
        }

        let tick_growth: HashMap<(Address, i32), TickFeeGrowth> = tick_calls
            .into_iter()
            .zip(tick_outcomes)
            .filter_map(|(key, outcome)| {
                let decoded = outcome.decode::<IUniswapV3Pool::ticksCall>()?;
                Some((
                    key,
                    TickFeeGrowth {
                        outside: FeeGrowth::new(
                            decoded.feeGrowthOutside0X128,
                            decoded.feeGrowthOutside1X128,
                        ),
                        initialized: decoded.initialized,
                    },
                ))
            })
            .collect();

        slots
            .into_iter()
            .map(|(token_id, slot)| {
                let pending = match slot {
                    Ok(pending) => pending,
                    Err(reason) => return PositionRead::Unavailable { token_id, reason },
                };
                let (pool, global) = match states.get(&pending.pool) {
                    Some((Ok(pool), global)) => (pool, global),
                    Some((Err(reason), _)) => {
                        return PositionRead::Unavailable {
                            token_id,
                            reason: reason.clone(),
                        }
                    }
                    None => {
                        return PositionRead::Unavailable {
                            token_id,
                            reason: format!("pool {} state unavailable", pending.pool),
                        }
                    }
                };
                let record = pending.record;
                let fee_growth = global.map(|global| PoolFeeGrowth {
                    global,
                    lower: tick_growth.get(&(pool.address, record.tick_lower)).copied(),
                    upper: tick_growth.get(&(pool.address, record.tick_upper)).copied(),
                });
                let token0 = metadata
                    .get(&record.token0)
                    .cloned()
                    .unwrap_or_else(|| TokenMeta::unknown(record.token0));
                let token1 = metadata
                    .get(&record.token1)
                    .cloned()
                    .unwrap_or_else(|| TokenMeta::unknown(record.token1));

                PositionRead::Ready(Box::new(PositionSnapshot {
                    position: record,
                    token0,
                    token1,
                    pool: pool.clone(),
                    fee_growth,
                }))
            })
            .collect()
    }
}

fn decode_record(token_id: U256, outcome: &CallOutcome) -> Result<PositionRecord, String> {
    if let Some(error) = outcome.failure() {
        return Err(format!("position record read failed: {error}"));
    }
    let decoded = outcome
        .decode::<INonfungiblePositionManager::positionsCall>()
        .ok_or_else(|| "position record unavailable".to_string())?;

    let tick_lower = i32::try_from(decoded.tickLower).map_err(|e| format!("bad tickLower: {e}"))?;
    let tick_upper = i32::try_from(decoded.tickUpper).map_err(|e| format!("bad tickUpper: {e}"))?;
    check_range(tick_lower, tick_upper).map_err(|e| e.to_string())?;
    let fee = decoded.fee.to::<u32>();

    Ok(PositionRecord {
        token_id,
        token0: decoded.token0,
        token1: decoded.token1,
        fee,
        tick_lower,
        tick_upper,
        liquidity: decoded.liquidity,
        fee_growth_inside_last: FeeGrowth::new(
            decoded.feeGrowthInside0LastX128,
            decoded.feeGrowthInside1LastX128,
        ),
        tokens_owed0: decoded.tokensOwed0,
        tokens_owed1: decoded.tokensOwed1,
    })
}

/// `symbol()` as `string`, or as `bytes32` for pre-standard tokens.
fn decode_symbol(outcome: &CallOutcome) -> Option<String> {
    let symbol = match outcome.decode::<IERC20Metadata::symbolCall>() {
        Some(decoded) => decoded.symbol,
        None => {
            let raw = outcome.decode::<IERC20SymbolBytes32::symbolCall>()?.symbol;
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            String::from_utf8(raw[..end].to_vec()).ok()?
        }
    };
    let symbol = symbol.trim().to_string();
    (!symbol.is_empty()).then_some(symbol)
}

fn decode_slot0(pool: Address, outcome: &CallOutcome) -> Option<PoolState> {
    let decoded = outcome.decode::<IUniswapV3Pool::slot0Call>()?;
    let tick = i32::try_from(decoded.tick).ok()?;
    if check_tick(tick).is_err() {
        debug!(pool = %pool, tick, "slot0 tick outside domain");
        return None;
    }
    Some(PoolState {
        address: pool,
        sqrt_price_x96: U256::from(decoded.sqrtPriceX96),
        tick,
    })
}

fn check_len(phase: Phase, expected: usize, got: usize) -> Result<(), ReadError> {
    if got == expected {
        return Ok(());
    }
    Err(ReadError::decode(
        &format!("{phase} batch"),
        format!("expected {expected} results, got {got}"),
    ))
}

/// Enumeration cannot be partial: a lost id read fails the request.
fn fail_on_lost(outcomes: &[CallOutcome]) -> Result<(), ReadError> {
    match outcomes.iter().find_map(CallOutcome::failure) {
        Some(error) => Err(error.clone()),
        None => Ok(()),
    }
}

fn fail_pending(slots: &mut [Slot], reason: &str) {
    for (_, slot) in slots.iter_mut() {
        if slot.is_ok() {
            *slot = Err(reason.to_string());
        }
    }
}

fn finish_unavailable(slots: Vec<Slot>) -> Vec<PositionRead> {
    slots
        .into_iter()
        .map(|(token_id, slot)| PositionRead::Unavailable {
            token_id,
            reason: slot
                .err()
                .unwrap_or_else(|| "position read incomplete".to_string()),
        })
        .collect()
}

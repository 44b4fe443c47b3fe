//! Shared test helpers.
//!
//! [`MockChain`] is an in-memory stand-in for the position manager, factory,
//! pools and tokens. It answers ABI-encoded calls the way the contracts would
//! and records every batch it receives, so tests can assert on round trips.
//! It can also stand behind [`RpcTransport`] as a raw [`EthCall`] endpoint,
//! answering Multicall3 `aggregate3` at the configured address.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::aliases::{I24, I56, U160, U24, U96};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use lp_data::abi::{
    IERC20Metadata, IMulticall3, INonfungiblePositionManager, IUniswapV3Factory, IUniswapV3Pool,
};
use lp_data::config::MULTICALL3;
use lp_data::{
    CallKind, CallOutcome, CallRequest, ChainConfig, EthCall, MetadataCache, ReadError,
    ReadOrchestrator, ReadTransport, RpcTransport, SpotPriceSource,
};

pub const LN_TICK_BASE: f64 = 0.000_099_995_000_333_308_34;

pub fn addr(last_byte: u8) -> Address {
    Address::with_last_byte(last_byte)
}

pub fn owner() -> Address {
    addr(0xAA)
}

/// Default config with a near-zero retry backoff.
pub fn test_config() -> ChainConfig {
    ChainConfig {
        retry_backoff: Duration::from_millis(1),
        ..ChainConfig::default()
    }
}

/// `sqrtPriceX96` for a tick, in float precision.
pub fn sqrt_price_x96_at(tick: i32) -> U256 {
    let sqrt = (f64::from(tick) * LN_TICK_BASE / 2.0).exp();
    U256::from((sqrt * 2f64.powi(96)) as u128)
}

/// Largest tick whose price does not exceed `price` (token1 per token0, raw units).
pub fn tick_for_raw_price(price: f64) -> i32 {
    (price.ln() / LN_TICK_BASE).floor() as i32
}

#[derive(Debug, Clone)]
pub struct MockPosition {
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub fee_growth_inside_last: (U256, U256),
    pub tokens_owed: (u128, u128),
}

impl MockPosition {
    pub fn new(token0: Address, token1: Address, tick_lower: i32, tick_upper: i32) -> Self {
        Self {
            token0,
            token1,
            fee: 3000,
            tick_lower,
            tick_upper,
            liquidity: 1_000_000_000_000_000_000,
            fee_growth_inside_last: (U256::ZERO, U256::ZERO),
            tokens_owed: (0, 0),
        }
    }

    pub fn with_fee(mut self, fee: u32) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_liquidity(mut self, liquidity: u128) -> Self {
        self.liquidity = liquidity;
        self
    }

    pub fn with_owed(mut self, owed0: u128, owed1: u128) -> Self {
        self.tokens_owed = (owed0, owed1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockPool {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub fee_growth_global: (U256, U256),
    /// `(feeGrowthOutside0, feeGrowthOutside1, initialized)` per tick.
    pub ticks: HashMap<i32, (U256, U256, bool)>,
}

impl MockPool {
    pub fn at_tick(tick: i32) -> Self {
        Self {
            sqrt_price_x96: sqrt_price_x96_at(tick),
            tick,
            fee_growth_global: (U256::ZERO, U256::ZERO),
            ticks: HashMap::new(),
        }
    }

    pub fn with_global(mut self, growth0: U256, growth1: U256) -> Self {
        self.fee_growth_global = (growth0, growth1);
        self
    }

    pub fn with_tick(mut self, tick: i32, outside0: U256, outside1: U256) -> Self {
        self.ticks.insert(tick, (outside0, outside1, true));
        self
    }
}

fn connection_reset() -> ReadError {
    ReadError::Network {
        method: "eth_call".to_string(),
        message: "connection reset".to_string(),
    }
}

fn reverted() -> ReadError {
    ReadError::Revert {
        message: "execution reverted".to_string(),
    }
}

/// Contract function a piece of calldata targets.
fn kind_of(data: &[u8]) -> Option<CallKind> {
    let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;
    let kinds = [
        (INonfungiblePositionManager::balanceOfCall::SELECTOR, CallKind::BalanceOf),
        (INonfungiblePositionManager::tokenOfOwnerByIndexCall::SELECTOR, CallKind::TokenOfOwnerByIndex),
        (INonfungiblePositionManager::positionsCall::SELECTOR, CallKind::Positions),
        (IERC20Metadata::symbolCall::SELECTOR, CallKind::Symbol),
        (IERC20Metadata::decimalsCall::SELECTOR, CallKind::Decimals),
        (IUniswapV3Factory::getPoolCall::SELECTOR, CallKind::GetPool),
        (IUniswapV3Pool::slot0Call::SELECTOR, CallKind::Slot0),
        (IUniswapV3Pool::feeGrowthGlobal0X128Call::SELECTOR, CallKind::FeeGrowthGlobal0),
        (IUniswapV3Pool::feeGrowthGlobal1X128Call::SELECTOR, CallKind::FeeGrowthGlobal1),
        (IUniswapV3Pool::ticksCall::SELECTOR, CallKind::Ticks),
    ];
    kinds
        .into_iter()
        .find(|(known, _)| *known == selector)
        .map(|(_, kind)| kind)
}

/// Calls of one kind to one target that get lost in transit.
#[derive(Debug)]
struct LostCalls {
    kind: CallKind,
    target: Address,
    remaining: AtomicUsize,
}

impl LostCalls {
    /// Whether `call` is lost this time; each loss uses up one.
    fn take(&self, call: &CallRequest) -> bool {
        call.kind == self.kind
            && call.target == self.target
            && self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
    }
}

/// In-memory chain answering the calls the read orchestrator issues.
#[derive(Debug, Default)]
pub struct MockChain {
    owned: Vec<U256>,
    positions: HashMap<U256, MockPosition>,
    tokens: HashMap<Address, (String, u8)>,
    registry: HashMap<(Address, Address, u32), Address>,
    pools: HashMap<Address, MockPool>,
    reverting: HashSet<Address>,
    failing_kind: Option<CallKind>,
    failures_left: AtomicUsize,
    lost: Vec<LostCalls>,
    no_multicall: bool,
    batches: Mutex<Vec<Vec<CallRequest>>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: Address, symbol: &str, decimals: u8) -> Self {
        self.tokens.insert(token, (symbol.to_string(), decimals));
        self
    }

    /// Register `pool` for `(token0, token1, fee)` in the factory.
    pub fn with_pool(mut self, token0: Address, token1: Address, fee: u32, pool: Address, state: MockPool) -> Self {
        self.registry.insert((token0, token1, fee), pool);
        self.registry.insert((token1, token0, fee), pool);
        self.pools.insert(pool, state);
        self
    }

    /// Mint a position to the owner.
    pub fn with_position(mut self, token_id: u64, position: MockPosition) -> Self {
        let token_id = U256::from(token_id);
        self.owned.push(token_id);
        self.positions.insert(token_id, position);
        self
    }

    /// Every call to `target` reverts.
    pub fn reverting(mut self, target: Address) -> Self {
        self.reverting.insert(target);
        self
    }

    /// The first `count` round trips fail at the transport level.
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Every round trip containing a call of `kind` fails at the transport level.
    pub fn failing_on(mut self, kind: CallKind) -> Self {
        self.failing_kind = Some(kind);
        self
    }

    /// The next `times` calls of `kind` to `target` time out, without failing
    /// the rest of their round trip. `usize::MAX` loses every one.
    pub fn failing_calls(mut self, kind: CallKind, target: Address, times: usize) -> Self {
        self.lost.push(LostCalls {
            kind,
            target,
            remaining: AtomicUsize::new(times),
        });
        self
    }

    /// No Multicall3 deployed: every `aggregate3` reverts.
    pub fn without_multicall(mut self) -> Self {
        self.no_multicall = true;
        self
    }

    /// Round trips received, failed ones included.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().expect("batch log").len()
    }

    /// All requests of `kind` across every round trip.
    pub fn calls_of(&self, kind: CallKind) -> Vec<CallRequest> {
        self.batches
            .lock()
            .expect("batch log")
            .iter()
            .flatten()
            .filter(|call| call.kind == kind)
            .cloned()
            .collect()
    }

    pub fn distinct_targets(&self, kind: CallKind) -> usize {
        self.calls_of(kind)
            .into_iter()
            .map(|call| call.target)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn clear_log(&self) {
        self.batches.lock().expect("batch log").clear();
    }

    fn is_lost(&self, call: &CallRequest) -> bool {
        self.lost.iter().any(|lost| lost.take(call))
    }

    fn log(&self, calls: Vec<CallRequest>) {
        self.batches.lock().expect("batch log").push(calls);
    }

    /// One `eth_call`, answered the way a node would.
    fn raw_call(&self, to: Address, data: &Bytes) -> Result<Bytes, ReadError> {
        if to == MULTICALL3 && data.starts_with(&IMulticall3::aggregate3Call::SELECTOR) {
            return self.aggregate(data);
        }
        let request = CallRequest {
            target: to,
            data: data.clone(),
            kind: kind_of(data).ok_or_else(reverted)?,
        };
        self.log(vec![request.clone()]);
        if self.is_lost(&request) {
            return Err(connection_reset());
        }
        match self.answer(&request) {
            CallOutcome::Returned(returned) => Ok(returned),
            _ => Err(reverted()),
        }
    }

    /// `aggregate3` with every inner call allowed to fail.
    fn aggregate(&self, data: &Bytes) -> Result<Bytes, ReadError> {
        if self.no_multicall {
            return Err(reverted());
        }
        let args = IMulticall3::aggregate3Call::abi_decode(data, true).map_err(|_| reverted())?;
        let requests: Vec<Option<CallRequest>> = args
            .calls
            .iter()
            .map(|inner| {
                Some(CallRequest {
                    target: inner.target,
                    data: inner.callData.clone(),
                    kind: kind_of(&inner.callData)?,
                })
            })
            .collect();
        self.log(requests.iter().flatten().cloned().collect());

        // A lost inner call takes the whole aggregated request down with it.
        if requests.iter().flatten().any(|request| self.is_lost(request)) {
            return Err(connection_reset());
        }

        let results: Vec<IMulticall3::Call3Result> = requests
            .iter()
            .map(|request| match request.as_ref().map(|r| self.answer(r)) {
                Some(CallOutcome::Returned(returned)) => IMulticall3::Call3Result {
                    success: true,
                    returnData: returned,
                },
                _ => IMulticall3::Call3Result {
                    success: false,
                    returnData: Bytes::new(),
                },
            })
            .collect();
        Ok(Bytes::from(IMulticall3::aggregate3Call::abi_encode_returns(&(results,))))
    }

    fn answer(&self, call: &CallRequest) -> CallOutcome {
        if self.reverting.contains(&call.target) {
            return CallOutcome::Unavailable;
        }
        match self.encode_return(call) {
            Some(data) => CallOutcome::Returned(Bytes::from(data)),
            None => CallOutcome::Unavailable,
        }
    }

    fn encode_return(&self, call: &CallRequest) -> Option<Vec<u8>> {
        let data = call.data.as_ref();
        let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;

        if selector == INonfungiblePositionManager::balanceOfCall::SELECTOR {
            let args = INonfungiblePositionManager::balanceOfCall::abi_decode(data, true).ok()?;
            let balance = if args.owner == owner() { self.owned.len() } else { 0 };
            return Some(INonfungiblePositionManager::balanceOfCall::abi_encode_returns(&(U256::from(
                balance,
            ),)));
        }
        if selector == INonfungiblePositionManager::tokenOfOwnerByIndexCall::SELECTOR {
            let args = INonfungiblePositionManager::tokenOfOwnerByIndexCall::abi_decode(data, true).ok()?;
            let index = usize::try_from(args.index).ok()?;
            let token_id = *self.owned.get(index)?;
            return Some(INonfungiblePositionManager::tokenOfOwnerByIndexCall::abi_encode_returns(&(
                token_id,
            )));
        }
        if selector == INonfungiblePositionManager::positionsCall::SELECTOR {
            let args = INonfungiblePositionManager::positionsCall::abi_decode(data, true).ok()?;
            let p = self.positions.get(&args.tokenId)?;
            return Some(INonfungiblePositionManager::positionsCall::abi_encode_returns(&(
                U96::ZERO,
                Address::ZERO,
                p.token0,
                p.token1,
                U24::from(p.fee),
                I24::try_from(p.tick_lower).ok()?,
                I24::try_from(p.tick_upper).ok()?,
                p.liquidity,
                p.fee_growth_inside_last.0,
                p.fee_growth_inside_last.1,
                p.tokens_owed.0,
                p.tokens_owed.1,
            )));
        }
        if selector == IERC20Metadata::symbolCall::SELECTOR {
            let (symbol, _) = self.tokens.get(&call.target)?;
            return Some(IERC20Metadata::symbolCall::abi_encode_returns(&(symbol.clone(),)));
        }
        if selector == IERC20Metadata::decimalsCall::SELECTOR {
            let (_, decimals) = self.tokens.get(&call.target)?;
            return Some(IERC20Metadata::decimalsCall::abi_encode_returns(&(*decimals,)));
        }
        if selector == IUniswapV3Factory::getPoolCall::SELECTOR {
            let args = IUniswapV3Factory::getPoolCall::abi_decode(data, true).ok()?;
            let key = (args.tokenA, args.tokenB, args.fee.to::<u32>());
            let pool = self.registry.get(&key).copied().unwrap_or(Address::ZERO);
            return Some(IUniswapV3Factory::getPoolCall::abi_encode_returns(&(pool,)));
        }

        let pool = self.pools.get(&call.target)?;
        if selector == IUniswapV3Pool::slot0Call::SELECTOR {
            return Some(IUniswapV3Pool::slot0Call::abi_encode_returns(&(
                U160::saturating_from(pool.sqrt_price_x96),
                I24::try_from(pool.tick).ok()?,
                0u16,
                1u16,
                1u16,
                0u8,
                true,
            )));
        }
        if selector == IUniswapV3Pool::feeGrowthGlobal0X128Call::SELECTOR {
            return Some(IUniswapV3Pool::feeGrowthGlobal0X128Call::abi_encode_returns(&(
                pool.fee_growth_global.0,
            )));
        }
        if selector == IUniswapV3Pool::feeGrowthGlobal1X128Call::SELECTOR {
            return Some(IUniswapV3Pool::feeGrowthGlobal1X128Call::abi_encode_returns(&(
                pool.fee_growth_global.1,
            )));
        }
        if selector == IUniswapV3Pool::ticksCall::SELECTOR {
            let args = IUniswapV3Pool::ticksCall::abi_decode(data, true).ok()?;
            let tick = i32::try_from(args.tick).ok()?;
            let (outside0, outside1, initialized) =
                pool.ticks.get(&tick).copied().unwrap_or((U256::ZERO, U256::ZERO, false));
            return Some(IUniswapV3Pool::ticksCall::abi_encode_returns(&(
                0u128,
                0i128,
                outside0,
                outside1,
                I56::ZERO,
                U160::ZERO,
                0u32,
                initialized,
            )));
        }
        None
    }
}

impl ReadTransport for MockChain {
    fn call_many(&self, calls: &[CallRequest]) -> impl Future<Output = Result<Vec<CallOutcome>, ReadError>> + Send {
        self.log(calls.to_vec());

        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        let kind_fails = self
            .failing_kind
            .is_some_and(|kind| calls.iter().any(|call| call.kind == kind));

        let result: Result<Vec<CallOutcome>, ReadError> = if injected || kind_fails {
            Err(connection_reset())
        } else {
            Ok(calls
                .iter()
                .map(|call| {
                    if self.is_lost(call) {
                        CallOutcome::Failed(connection_reset())
                    } else {
                        self.answer(call)
                    }
                })
                .collect())
        };
        std::future::ready(result)
    }
}

impl EthCall for MockChain {
    fn eth_call(&self, to: Address, data: &Bytes) -> impl Future<Output = Result<Bytes, ReadError>> + Send {
        std::future::ready(self.raw_call(to, data))
    }
}

/// Orchestrator reading `chain` through the JSON-RPC transport logic
/// (chunking, `aggregate3`, per-call fallback) configured by `config`.
pub fn rpc_reader(chain: MockChain, config: &ChainConfig) -> ReadOrchestrator<RpcTransport<MockChain>> {
    let transport = RpcTransport::with_client(chain, config).expect("valid config");
    ReadOrchestrator::new(transport, config, std::sync::Arc::new(MetadataCache::new()))
}

/// Orchestrator over `chain` with a fresh metadata cache.
pub fn reader(chain: MockChain, config: &ChainConfig) -> ReadOrchestrator<MockChain> {
    ReadOrchestrator::new(chain, config, std::sync::Arc::new(MetadataCache::new()))
}

/// Three positions in one AAA/BBB pool (fee 3000, tick 0), tokens 0x01 and 0x02.
pub fn shared_pool_chain() -> MockChain {
    let (aaa, bbb, pool) = (addr(1), addr(2), addr(0x10));
    MockChain::new()
        .with_token(aaa, "AAA", 18)
        .with_token(bbb, "BBB", 18)
        .with_pool(aaa, bbb, 3000, pool, MockPool::at_tick(0))
        .with_position(1, MockPosition::new(aaa, bbb, -100, 100))
        .with_position(2, MockPosition::new(aaa, bbb, -600, 600))
        .with_position(3, MockPosition::new(aaa, bbb, 120, 600))
}

/// Spot prices from a fixed table; unknown symbols fail.
#[derive(Debug, Default)]
pub struct StaticSpot {
    prices: HashMap<String, f64>,
}

impl StaticSpot {
    pub fn new(entries: &[(&str, f64)]) -> Self {
        Self {
            prices: entries
                .iter()
                .map(|(symbol, price)| (symbol.to_string(), *price))
                .collect(),
        }
    }
}

impl SpotPriceSource for StaticSpot {
    fn spot_price(&self, symbol: &str) -> impl Future<Output = Result<f64, ReadError>> + Send {
        let result = self
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ReadError::InvalidInput(format!("no price for {symbol}")));
        std::future::ready(result)
    }
}

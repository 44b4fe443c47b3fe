//! lp-data: read-only chain and price access for position valuation.
//!
//! Batches a wallet's position reads into a few phase-ordered round trips
//! (JSON-RPC `eth_call`, optionally through Multicall3), decodes the results
//! into snapshots, and looks up spot USD prices. Nothing here writes state
//! beyond the idempotent metadata and price caches.

pub mod abi;
pub mod cache;
pub mod config;
pub mod error;
pub mod multicall;
pub mod orchestrator;
pub mod rpc;
pub mod spot;
pub mod transport;
pub mod types;

pub use cache::{MetadataCache, PriceCache};
pub use config::{parse_address, ChainConfig, FeeMode};
pub use error::ReadError;
pub use orchestrator::{Phase, ReadOrchestrator};
pub use rpc::{EthCall, RpcClient, RpcTransport};
pub use spot::{BinanceSpot, SpotPriceSource};
pub use transport::{CallKind, CallOutcome, CallRequest, ReadTransport};
pub use types::{
    PoolState, PositionRead, PositionRecord, PositionSnapshot, ReadStats, TokenMeta, WalletRead,
};

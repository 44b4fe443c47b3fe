//! Integration tests for the JSON-RPC transport logic: Multicall3 chunking,
//! the per-call fallback and partial transport failures.
//!
//! Run with: cargo test --test batching

mod common;

use alloy::primitives::U256;
use common::*;
use lp_data::{CallKind, ChainConfig, PositionRead};

fn config(batching: bool, batch_size: usize) -> ChainConfig {
    ChainConfig {
        batching,
        batch_size,
        ..test_config()
    }
}

/// Two positions in an AAA(18)/USDC(6) pool.
fn usdc_chain() -> MockChain {
    let (aaa, usdc) = (addr(1), addr(2));
    MockChain::new()
        .with_token(aaa, "AAA", 18)
        .with_token(usdc, "USDC", 6)
        .with_pool(aaa, usdc, 3000, addr(0x10), MockPool::at_tick(0))
        .with_position(1, MockPosition::new(aaa, usdc, -100, 100))
        .with_position(2, MockPosition::new(aaa, usdc, -600, 600))
}

async fn baseline() -> Vec<PositionRead> {
    let reader = reader(shared_pool_chain(), &test_config());
    reader.read_wallet(owner()).await.expect("wallet reads").positions
}

#[tokio::test]
async fn every_chunk_size_reads_the_same_snapshots() {
    let expected = baseline().await;
    assert_eq!(expected.iter().filter_map(PositionRead::snapshot).count(), 3);

    // balanceOf 1, ids 3, records 3, metadata 4 + 3, pool state 3 + 5 ticks.
    for (batch_size, eth_calls) in [(1, 22), (2, 13), (64, 5)] {
        let reader = rpc_reader(shared_pool_chain(), &config(true, batch_size));
        let wallet = reader.read_wallet(owner()).await.expect("wallet reads");

        assert_eq!(wallet.positions, expected, "batch size {batch_size}");
        assert_eq!(wallet.stats.batches, 5, "batch size {batch_size}");
        assert_eq!(reader.transport().client().batch_count(), eth_calls, "batch size {batch_size}");
    }
}

#[tokio::test]
async fn individual_calls_read_the_same_snapshots() {
    let expected = baseline().await;
    let reader = rpc_reader(shared_pool_chain(), &config(false, 64));
    let wallet = reader.read_wallet(owner()).await.expect("wallet reads");

    assert_eq!(wallet.positions, expected);
    assert_eq!(reader.transport().client().batch_count(), 22);
}

#[tokio::test]
async fn missing_multicall_falls_back_to_individual_calls() {
    let expected = baseline().await;
    let reader = rpc_reader(shared_pool_chain().without_multicall(), &config(true, 4));
    let wallet = reader.read_wallet(owner()).await.expect("wallet reads");

    assert_eq!(wallet.positions, expected);
    assert_eq!(wallet.stats.retries, 0);
    assert_eq!(reader.transport().client().batch_count(), 22);
}

#[tokio::test]
async fn reverting_token_is_a_placeholder_in_every_mode() {
    for config in [config(true, 64), config(true, 1), config(false, 64)] {
        let reader = rpc_reader(shared_pool_chain().reverting(addr(2)), &config);
        let wallet = reader.read_wallet(owner()).await.expect("wallet reads");

        let snapshot = wallet.positions[0].snapshot().expect("position still ready");
        assert!(snapshot.token1.is_unknown());
        assert_eq!(wallet.stats.retries, 0, "a revert is not retried");
    }
}

#[tokio::test]
async fn timed_out_call_without_batching_is_retried() {
    let chain = usdc_chain().failing_calls(CallKind::Decimals, addr(2), 1);
    let reader = rpc_reader(chain, &config(false, 64));
    let wallet = reader.read_wallet(owner()).await.expect("wallet reads");

    assert_eq!(wallet.stats.retries, 1);
    for read in &wallet.positions {
        let snapshot = read.snapshot().expect("position ready");
        assert_eq!(snapshot.token1.decimals, 6);
    }
    assert_eq!(reader.transport().client().calls_of(CallKind::Decimals).len(), 3);
}

#[tokio::test]
async fn lost_chunk_among_several_is_retried() {
    let chain = usdc_chain().failing_calls(CallKind::Decimals, addr(2), 1);
    let reader = rpc_reader(chain, &config(true, 2));
    let wallet = reader.read_wallet(owner()).await.expect("wallet reads");

    assert_eq!(wallet.stats.retries, 1);
    let snapshot = wallet.positions[1].snapshot().expect("position ready");
    assert_eq!(snapshot.token1.symbol, "USDC");
    assert_eq!(snapshot.token1.decimals, 6);
}

#[tokio::test]
async fn chunk_lost_twice_leaves_positions_unavailable() {
    let chain = usdc_chain().failing_calls(CallKind::Decimals, addr(2), usize::MAX);
    let reader = rpc_reader(chain, &config(true, 2));
    let wallet = reader.read_wallet(owner()).await.expect("enumeration succeeds");

    assert_eq!(wallet.positions.len(), 2);
    for read in &wallet.positions {
        let PositionRead::Unavailable { token_id, reason } = read else {
            panic!("position valued with unread decimals: {read:?}");
        };
        assert!(*token_id == U256::from(1u64) || *token_id == U256::from(2u64));
        assert!(reason.contains("token metadata read failed"), "{reason}");
    }
    assert!(!reader.metadata_cache().contains(&addr(2)));
}

//! Process-wide caches shared by concurrent reads.
//!
//! - [`MetadataCache`]: token symbol/decimals. Populate-once, never invalidated;
//!   a token's metadata cannot change.
//! - [`PriceCache`]: spot prices, each entry valid for a fixed TTL.
//!
//! Both are safe for concurrent readers. Two reads racing to populate the same
//! entry write the same value, so the loser's write is harmless.

use std::time::{Duration, Instant};

use alloy::primitives::Address;
use dashmap::DashMap;

use crate::types::TokenMeta;

/// Token metadata keyed by token address.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<Address, TokenMeta>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &Address) -> Option<TokenMeta> {
        self.entries.get(token).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.entries.contains_key(token)
    }

    /// Store metadata unless the token is already cached.
    ///
    /// Placeholder metadata (unreadable token) is never stored, so a transient
    /// failure does not stick for the life of the process.
    pub fn insert(&self, meta: TokenMeta) {
        if meta.is_unknown() {
            return;
        }
        self.entries.entry(meta.address).or_insert(meta);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Spot prices keyed by upper-cased symbol.
#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    entries: DashMap<String, (f64, Instant)>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached price if it is younger than the TTL.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        let entry = self.entries.get(&symbol.to_ascii_uppercase())?;
        let (price, fetched_at) = *entry.value();
        (fetched_at.elapsed() < self.ttl).then_some(price)
    }

    pub fn insert(&self, symbol: &str, price: f64) {
        self.entries
            .insert(symbol.to_ascii_uppercase(), (price, Instant::now()));
    }
}

// =============================================================================
// Storage — read side consumed by the analyzers, write side for signals
// =============================================================================
//
// Analyzers only ever see `&dyn MarketDataStore`, so any backend (the bundled
// in-memory store, a database, a test double) can feed them.  All sequences
// returned by the read methods are ordered newest-first.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Candle, FundingRate, OpenInterest, OrderBook, SignalResult};

pub use memory::InMemoryStore;

/// Market data read by the analyzers.
#[async_trait]
pub trait MarketDataStore: Send + Sync {
    /// Up to `limit` candles for `(symbol, interval)`, newest first.
    async fn get_candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>>;

    /// The `n` most recent candles, newest first.
    async fn get_latest_candles(&self, symbol: &str, interval: &str, n: usize)
        -> Result<Vec<Candle>>;

    /// Most recent order-book snapshot. Errors when none is stored.
    async fn get_latest_order_book(&self, symbol: &str) -> Result<OrderBook>;

    /// Up to `limit` funding observations, newest first.
    async fn get_funding_rates(&self, symbol: &str, limit: usize) -> Result<Vec<FundingRate>>;

    /// Up to `limit` open-interest observations, newest first.
    async fn get_open_interest(&self, symbol: &str, limit: usize) -> Result<Vec<OpenInterest>>;
}

/// Destination for computed signals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn save_signal(&self, signal: &SignalResult) -> Result<()>;

    /// Up to `limit` stored signals for `symbol`, newest first.
    async fn get_signal_history(&self, symbol: &str, limit: usize) -> Result<Vec<SignalResult>>;
}

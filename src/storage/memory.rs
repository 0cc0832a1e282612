// =============================================================================
// InMemoryStore — bounded per-symbol series behind parking_lot locks
// =============================================================================
//
// Each series is kept oldest-first internally (cheap append + front trim) and
// reversed on read so callers always receive newest-first sequences.

use std::collections::{BTreeSet, HashMap, VecDeque};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{MarketDataStore, SignalSink};
use crate::config::StorageConfig;
use crate::types::{Candle, FundingRate, OpenInterest, OrderBook, SignalResult};

/// Composite key that identifies a unique candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CandleKey {
    symbol: String,
    interval: String,
}

impl CandleKey {
    fn new(symbol: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        }
    }
}

/// Process-local market data and signal history.
pub struct InMemoryStore {
    candles: RwLock<HashMap<CandleKey, VecDeque<Candle>>>,
    order_books: RwLock<HashMap<String, OrderBook>>,
    funding: RwLock<HashMap<String, VecDeque<FundingRate>>>,
    open_interest: RwLock<HashMap<String, VecDeque<OpenInterest>>>,
    signals: RwLock<HashMap<String, VecDeque<SignalResult>>>,
    limits: StorageConfig,
}

impl InMemoryStore {
    pub fn new(limits: StorageConfig) -> Self {
        Self {
            candles: RwLock::new(HashMap::new()),
            order_books: RwLock::new(HashMap::new()),
            funding: RwLock::new(HashMap::new()),
            open_interest: RwLock::new(HashMap::new()),
            signals: RwLock::new(HashMap::new()),
            limits,
        }
    }

    // ── Writes ─────────────────────────────────────────────────────────────

    /// Insert or replace a candle.
    ///
    /// A candle with an `open_time` already present replaces the stored one
    /// (an in-progress candle being updated); otherwise it is inserted in
    /// open-time order and the oldest entries are dropped beyond capacity.
    pub fn save_candle(&self, candle: Candle) {
        let key = CandleKey::new(&candle.symbol, &candle.interval);
        let mut map = self.candles.write();
        let ring = map.entry(key).or_default();
        upsert_ordered(ring, candle, |c| c.open_time);
        trim_front(ring, self.limits.candle_capacity);
    }

    /// Bulk variant of [`save_candle`](Self::save_candle) used for backfills.
    pub fn save_candles(&self, candles: Vec<Candle>) {
        if candles.is_empty() {
            return;
        }
        let mut map = self.candles.write();
        for candle in candles {
            let key = CandleKey::new(&candle.symbol, &candle.interval);
            let ring = map.entry(key).or_default();
            upsert_ordered(ring, candle, |c| c.open_time);
            trim_front(ring, self.limits.candle_capacity);
        }
    }

    /// Replace the order-book snapshot for its symbol.
    pub fn save_order_book(&self, book: OrderBook) {
        debug!(
            symbol = %book.symbol,
            bids = book.bids.len(),
            asks = book.asks.len(),
            "order book stored"
        );
        self.order_books.write().insert(book.symbol.clone(), book);
    }

    pub fn save_funding_rate(&self, rate: FundingRate) {
        let mut map = self.funding.write();
        let series = map.entry(rate.symbol.clone()).or_default();
        upsert_ordered(series, rate, |r| r.timestamp);
        trim_front(series, self.limits.series_capacity);
    }

    pub fn save_open_interest(&self, oi: OpenInterest) {
        let mut map = self.open_interest.write();
        let series = map.entry(oi.symbol.clone()).or_default();
        upsert_ordered(series, oi, |o| o.timestamp);
        trim_front(series, self.limits.series_capacity);
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    /// Every symbol for which any market data has been stored, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut set: BTreeSet<String> = BTreeSet::new();
        set.extend(self.candles.read().keys().map(|k| k.symbol.clone()));
        set.extend(self.order_books.read().keys().cloned());
        set.extend(self.funding.read().keys().cloned());
        set.extend(self.open_interest.read().keys().cloned());
        set.into_iter().collect()
    }

    /// Number of candles held for `(symbol, interval)`.
    pub fn candle_count(&self, symbol: &str, interval: &str) -> usize {
        self.candles
            .read()
            .get(&CandleKey::new(symbol, interval))
            .map_or(0, VecDeque::len)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

/// Insert `item` keeping `ring` sorted by `key`; an equal key replaces.
fn upsert_ordered<T>(ring: &mut VecDeque<T>, item: T, key: impl Fn(&T) -> i64) {
    let k = key(&item);
    match ring.back().map(&key) {
        None => ring.push_back(item),
        Some(last) if k > last => ring.push_back(item),
        Some(last) if k == last => {
            if let Some(slot) = ring.back_mut() {
                *slot = item;
            }
        }
        Some(_) => match ring.binary_search_by_key(&k, |x| key(x)) {
            Ok(idx) => ring[idx] = item,
            Err(idx) => ring.insert(idx, item),
        },
    }
}

fn trim_front<T>(ring: &mut VecDeque<T>, capacity: usize) {
    let capacity = capacity.max(1);
    while ring.len() > capacity {
        ring.pop_front();
    }
}

/// Clone the newest `limit` entries, newest first.
fn newest_first<T: Clone>(ring: Option<&VecDeque<T>>, limit: usize) -> Vec<T> {
    ring.map(|r| r.iter().rev().take(limit).cloned().collect())
        .unwrap_or_default()
}

#[async_trait]
impl MarketDataStore for InMemoryStore {
    async fn get_candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let map = self.candles.read();
        Ok(newest_first(map.get(&CandleKey::new(symbol, interval)), limit))
    }

    async fn get_latest_candles(
        &self,
        symbol: &str,
        interval: &str,
        n: usize,
    ) -> Result<Vec<Candle>> {
        self.get_candles(symbol, interval, n).await
    }

    async fn get_latest_order_book(&self, symbol: &str) -> Result<OrderBook> {
        self.order_books
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("no order book stored for {symbol}"))
    }

    async fn get_funding_rates(&self, symbol: &str, limit: usize) -> Result<Vec<FundingRate>> {
        Ok(newest_first(self.funding.read().get(symbol), limit))
    }

    async fn get_open_interest(&self, symbol: &str, limit: usize) -> Result<Vec<OpenInterest>> {
        Ok(newest_first(self.open_interest.read().get(symbol), limit))
    }
}

#[async_trait]
impl SignalSink for InMemoryStore {
    async fn save_signal(&self, signal: &SignalResult) -> Result<()> {
        let mut map = self.signals.write();
        let history = map.entry(signal.symbol.clone()).or_default();
        history.push_back(signal.clone());
        trim_front(history, self.limits.signal_history_capacity);
        Ok(())
    }

    async fn get_signal_history(&self, symbol: &str, limit: usize) -> Result<Vec<SignalResult>> {
        Ok(newest_first(self.signals.read().get(symbol), limit))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderBookLevel, Recommendation};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn candle(symbol: &str, open_time: i64, close: f64) -> Candle {
        Candle {
            symbol: symbol.into(),
            interval: "1m".into(),
            open_time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            close_time: open_time + 59_999,
        }
    }

    fn small_store() -> InMemoryStore {
        InMemoryStore::new(StorageConfig {
            candle_capacity: 3,
            series_capacity: 2,
            signal_history_capacity: 2,
        })
    }

    #[tokio::test]
    async fn candles_trimmed_and_returned_newest_first() {
        let store = small_store();
        for i in 0..5 {
            store.save_candle(candle("BTCUSDT", i * 60_000, 100.0 + i as f64));
        }

        let got = store.get_candles("BTCUSDT", "1m", 10).await.unwrap();
        let closes: Vec<f64> = got.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![104.0, 103.0, 102.0]);
        assert_eq!(store.candle_count("BTCUSDT", "1m"), 3);
    }

    #[tokio::test]
    async fn same_open_time_replaces() {
        let store = InMemoryStore::default();
        store.save_candle(candle("ETHUSDT", 0, 50.0));
        store.save_candle(candle("ETHUSDT", 0, 51.0));

        let got = store.get_latest_candles("ETHUSDT", "1m", 1).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].close, 51.0);
    }

    #[tokio::test]
    async fn out_of_order_backfill_is_sorted() {
        let store = InMemoryStore::default();
        store.save_candles(vec![
            candle("BTCUSDT", 120_000, 3.0),
            candle("BTCUSDT", 0, 1.0),
            candle("BTCUSDT", 60_000, 2.0),
            candle("BTCUSDT", 60_000, 2.5),
        ]);

        let got = store.get_candles("BTCUSDT", "1m", 10).await.unwrap();
        let closes: Vec<f64> = got.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![3.0, 2.5, 1.0]);
    }

    #[tokio::test]
    async fn limit_respected() {
        let store = InMemoryStore::default();
        for i in 0..10 {
            store.save_candle(candle("BTCUSDT", i * 60_000, i as f64));
        }
        let got = store.get_candles("BTCUSDT", "1m", 4).await.unwrap();
        assert_eq!(got.len(), 4);
        assert_eq!(got[0].close, 9.0);
    }

    #[tokio::test]
    async fn missing_order_book_is_error() {
        let store = InMemoryStore::default();
        assert!(store.get_latest_order_book("BTCUSDT").await.is_err());

        store.save_order_book(OrderBook {
            symbol: "BTCUSDT".into(),
            timestamp: 1,
            bids: vec![OrderBookLevel::new("100", "1")],
            asks: vec![OrderBookLevel::new("101", "1")],
        });
        let book = store.get_latest_order_book("BTCUSDT").await.unwrap();
        assert_eq!(book.bids.len(), 1);
    }

    #[tokio::test]
    async fn funding_series_newest_first_and_capped() {
        let store = small_store();
        for (ts, rate) in [(1, "0.0001"), (2, "0.0002"), (3, "0.0003")] {
            store.save_funding_rate(FundingRate {
                symbol: "BTCUSDT".into(),
                rate: rate.into(),
                timestamp: ts,
                next_funding_time: ts + 8,
            });
        }
        let got = store.get_funding_rates("BTCUSDT", 10).await.unwrap();
        let rates: Vec<&str> = got.iter().map(|r| r.rate.as_str()).collect();
        assert_eq!(rates, vec!["0.0003", "0.0002"]);
    }

    #[tokio::test]
    async fn signal_history_round_trip() {
        let store = small_store();
        for i in 0..3 {
            let signal = SignalResult {
                symbol: "BTCUSDT".into(),
                timestamp: Utc::now(),
                recommendation: Recommendation::Neutral,
                signal_strength: i as f64,
                position_size: 0.0,
                current_price: 100.0,
                components: BTreeMap::new(),
            };
            store.save_signal(&signal).await.unwrap();
        }
        let history = store.get_signal_history("BTCUSDT", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].signal_strength, 2.0);
        assert!(store.get_signal_history("ETHUSDT", 10).await.unwrap().is_empty());
    }

    #[test]
    fn symbols_are_collected_across_series() {
        let store = InMemoryStore::default();
        store.save_candle(candle("ETHUSDT", 0, 1.0));
        store.save_open_interest(OpenInterest {
            symbol: "BTCUSDT".into(),
            value: "100".into(),
            timestamp: 0,
        });
        assert_eq!(store.symbols(), vec!["BTCUSDT", "ETHUSDT"]);
    }
}

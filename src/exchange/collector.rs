// =============================================================================
// Market Data Collector — REST polling into the in-memory store
// =============================================================================
//
// On start every configured series is backfilled once, then one polling loop
// per (feed, symbol) refreshes it on the feed's own cadence.  Fetch errors are
// logged and the loop keeps going; all loops stop when the token is cancelled.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::future::join_all;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::BinanceFuturesClient;
use crate::config::{AppConfig, CollectorConfig};
use crate::storage::InMemoryStore;

/// Candles requested per interval on backfill.
const BACKFILL_CANDLES: u32 = 500;
/// Candles requested per refresh; covers the in-progress candle plus the one
/// that closed since the last poll.
const REFRESH_CANDLES: u32 = 3;
/// Limits the depth endpoint accepts.
const DEPTH_LIMITS: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feed {
    Candles,
    OrderBook,
    Funding,
    OpenInterest,
}

impl Feed {
    const ALL: [Feed; 4] = [Feed::Candles, Feed::OrderBook, Feed::Funding, Feed::OpenInterest];

    fn name(self) -> &'static str {
        match self {
            Feed::Candles => "candles",
            Feed::OrderBook => "order_book",
            Feed::Funding => "funding",
            Feed::OpenInterest => "open_interest",
        }
    }
}

pub struct MarketDataCollector {
    client: BinanceFuturesClient,
    store: Arc<InMemoryStore>,
    symbols: Vec<String>,
    cfg: CollectorConfig,
    /// Candle intervals to keep fresh: configured ones plus whatever the
    /// analyzers read.
    intervals: Vec<String>,
    depth: usize,
    funding_history: usize,
    oi_period: String,
    oi_history: usize,
}

impl MarketDataCollector {
    pub fn new(app: &AppConfig, store: Arc<InMemoryStore>) -> Result<Self> {
        let cfg = app.collector.clone();
        let client = BinanceFuturesClient::new(cfg.base_url.clone())?;

        let mut intervals = cfg.candle_intervals.clone();
        for needed in [
            "1m",
            app.candle_interval.as_str(),
            app.analysis.open_interest.candle_interval.as_str(),
        ] {
            if !intervals.iter().any(|i| i == needed) {
                intervals.push(needed.to_string());
            }
        }

        Ok(Self {
            client,
            store,
            symbols: app.symbols.clone(),
            intervals,
            depth: depth_limit(app.analysis.orderbook.depth),
            funding_history: app.analysis.funding.periods,
            oi_period: app.analysis.open_interest.candle_interval.clone(),
            oi_history: app.analysis.open_interest.lookback,
            cfg,
        })
    }

    fn period(&self, feed: Feed) -> Duration {
        CollectorConfig::period(match feed {
            Feed::Candles => self.cfg.candle_refresh_secs,
            Feed::OrderBook => self.cfg.order_book_refresh_secs,
            Feed::Funding => self.cfg.funding_refresh_secs,
            Feed::OpenInterest => self.cfg.open_interest_refresh_secs,
        })
    }

    // ── Backfill ───────────────────────────────────────────────────────────

    async fn backfill(&self, symbol: &str) {
        for interval in &self.intervals {
            match self.client.get_klines(symbol, interval, BACKFILL_CANDLES).await {
                Ok(candles) => {
                    let n = candles.len();
                    self.store.save_candles(candles);
                    info!(symbol, interval = %interval, candles = n, "candle backfill complete");
                }
                Err(e) => warn!(symbol, interval = %interval, error = %e, "candle backfill failed"),
            }
        }

        match self.client.get_funding_history(symbol, self.funding_history).await {
            Ok(rates) => rates.into_iter().for_each(|r| self.store.save_funding_rate(r)),
            Err(e) => warn!(symbol, error = %e, "funding backfill failed"),
        }

        match self
            .client
            .get_open_interest_history(symbol, &self.oi_period, self.oi_history)
            .await
        {
            Ok(series) => series.into_iter().for_each(|oi| self.store.save_open_interest(oi)),
            Err(e) => warn!(symbol, error = %e, "open interest backfill failed"),
        }
    }

    async fn initial_fetch(&self, symbol: &str) {
        self.backfill(symbol).await;
        // Snapshot feeds have no history endpoint.
        for feed in [Feed::OrderBook, Feed::Funding, Feed::OpenInterest] {
            if let Err(e) = self.refresh(feed, symbol).await {
                warn!(symbol, feed = feed.name(), error = %e, "initial fetch failed");
            }
        }
    }

    // ── Refresh ────────────────────────────────────────────────────────────

    async fn refresh(&self, feed: Feed, symbol: &str) -> Result<()> {
        match feed {
            Feed::Candles => {
                for interval in &self.intervals {
                    let candles = self.client.get_klines(symbol, interval, REFRESH_CANDLES).await?;
                    self.store.save_candles(candles);
                }
            }
            Feed::OrderBook => {
                let book = self.client.get_order_book(symbol, self.depth).await?;
                self.store.save_order_book(book);
            }
            Feed::Funding => {
                let rate = self.client.get_funding_rate(symbol).await?;
                self.store.save_funding_rate(rate);
            }
            Feed::OpenInterest => {
                let oi = self.client.get_open_interest(symbol).await?;
                self.store.save_open_interest(oi);
            }
        }
        Ok(())
    }

    async fn poll(self: Arc<Self>, feed: Feed, symbol: String, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.period(feed));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The backfill already produced a fresh value.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.refresh(feed, &symbol).await {
                        warn!(symbol = %symbol, feed = feed.name(), error = %e, "refresh failed");
                    }
                }
            }
        }
        debug!(symbol = %symbol, feed = feed.name(), "poll loop stopped");
    }

    /// Backfill, then poll every feed for every symbol until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if !self.cfg.enabled {
            info!("market data collector disabled");
            return;
        }

        info!(
            symbols = ?self.symbols,
            intervals = ?self.intervals,
            depth = self.depth,
            "market data collector starting"
        );

        let backfills = join_all(self.symbols.iter().map(|s| self.initial_fetch(s)));
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("market data collector stopped during backfill");
                return;
            }
            _ = backfills => {}
        }

        let mut loops = JoinSet::new();
        for symbol in &self.symbols {
            for feed in Feed::ALL {
                loops.spawn(Arc::clone(&self).poll(feed, symbol.clone(), cancel.clone()));
            }
        }
        info!(tasks = loops.len(), "market data polling started");

        while loops.join_next().await.is_some() {}
        info!("market data collector stopped");
    }
}

/// Smallest accepted depth limit that covers `requested`.
fn depth_limit(requested: usize) -> usize {
    DEPTH_LIMITS
        .iter()
        .copied()
        .find(|&l| l >= requested)
        .unwrap_or(DEPTH_LIMITS[DEPTH_LIMITS.len() - 1])
}

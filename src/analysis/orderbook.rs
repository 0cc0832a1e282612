// =============================================================================
// Order Book Analyzer — microstructure read of the latest snapshot
// =============================================================================
//
// Sub-signal weights:
//   imbalance 0.40 · depth 0.20 · support/resistance 0.25 · spread 0.15
//
// Levels arrive as decimal strings; they are parsed once, then bids are
// sorted by descending price and asks by ascending price.

use async_trait::async_trait;
use tracing::debug;

use super::{clamp_score, Analyzer, AnalyzerKind};
use crate::config::OrderBookConfig;
use crate::error::{parse_decimal, AnalyzerError};
use crate::storage::MarketDataStore;
use crate::types::OrderBookLevel;

const W_IMBALANCE: f64 = 0.40;
const W_DEPTH: f64 = 0.20;
const W_SUPPORT_RESISTANCE: f64 = 0.25;
const W_SPREAD: f64 = 0.15;

/// Distance bands from mid price and their weights (nearest weighs most).
const DEPTH_BANDS: [(f64, f64); 4] = [(0.005, 0.4), (0.01, 0.3), (0.02, 0.2), (0.05, 0.1)];

/// A level counts as significant above this multiple of its side's mean size.
const SIGNIFICANT_MULTIPLE: f64 = 1.5;
/// Volume at which a support/resistance level is considered full strength.
const LEVEL_STRENGTH_VOLUME: f64 = 1_000.0;
/// Distances beyond 10% of mid are treated as 10%.
const MAX_LEVEL_DISTANCE: f64 = 0.1;
/// Inter-level gaps averaged per side for the spread reading.
const SPREAD_LEVELS: usize = 5;
/// Structural sub-signals need at least this many levels on each side.
const MIN_LEVELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: f64,
    pub amount: f64,
}

pub struct OrderBookAnalyzer {
    cfg: OrderBookConfig,
}

impl OrderBookAnalyzer {
    pub fn new(cfg: OrderBookConfig) -> Self {
        Self { cfg }
    }

    /// Score already-parsed, sorted, non-empty sides.
    fn score(&self, bids: &[Level], asks: &[Level]) -> f64 {
        let imbalance = imbalance_signal(bids, asks, self.cfg.imbalance_threshold);
        let depth = depth_signal(bids, asks);
        let sr = support_resistance_signal(bids, asks);
        let spread = spread_signal(bids, asks);

        debug!(imbalance, depth, support_resistance = sr, spread, "orderbook sub-signals");

        clamp_score(
            imbalance * W_IMBALANCE + depth * W_DEPTH + sr * W_SUPPORT_RESISTANCE + spread * W_SPREAD,
        )
    }
}

#[async_trait]
impl Analyzer for OrderBookAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::OrderBook
    }

    async fn analyze(&self, store: &dyn MarketDataStore, symbol: &str) -> Result<f64, AnalyzerError> {
        let book = store.get_latest_order_book(symbol).await?;

        let (bids, asks) = parse_sides(&book.bids, &book.asks)?;
        if bids.is_empty() || asks.is_empty() {
            return Err(AnalyzerError::EmptyOrderBook);
        }

        Ok(self.score(&bids, &asks))
    }
}

/// Parse both sides and sort them best-price first.
pub fn parse_sides(
    bids: &[OrderBookLevel],
    asks: &[OrderBookLevel],
) -> Result<(Vec<Level>, Vec<Level>), AnalyzerError> {
    let parse = |levels: &[OrderBookLevel]| -> Result<Vec<Level>, AnalyzerError> {
        levels
            .iter()
            .map(|l| {
                Ok(Level {
                    price: parse_decimal("order book price", &l.price)?,
                    amount: parse_decimal("order book amount", &l.amount)?,
                })
            })
            .collect()
    };

    let mut bids = parse(bids)?;
    let mut asks = parse(asks)?;
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));
    asks.sort_by(|a, b| a.price.total_cmp(&b.price));
    Ok((bids, asks))
}

fn mid_price(bids: &[Level], asks: &[Level]) -> f64 {
    (bids[0].price + asks[0].price) / 2.0
}

fn total(levels: &[Level]) -> f64 {
    levels.iter().map(|l| l.amount).sum()
}

// ── Sub-signals ───────────────────────────────────────────────────────────

/// `(bid - ask) / (bid + ask) * 100`, zeroed inside the dead-zone.
pub fn imbalance_signal(bids: &[Level], asks: &[Level], threshold: f64) -> f64 {
    let (bid_vol, ask_vol) = (total(bids), total(asks));
    let sum = bid_vol + ask_vol;
    if sum <= 0.0 {
        return 0.0;
    }
    let imbalance = (bid_vol - ask_vol) / sum * 100.0;
    if imbalance.abs() < threshold {
        0.0
    } else {
        imbalance
    }
}

/// Cumulative bid/ask balance within 0.5 / 1 / 2 / 5 % of mid.
pub fn depth_signal(bids: &[Level], asks: &[Level]) -> f64 {
    let mid = mid_price(bids, asks);
    if mid <= 0.0 {
        return 0.0;
    }

    DEPTH_BANDS
        .iter()
        .map(|&(band, weight)| {
            let bid_vol: f64 = bids
                .iter()
                .filter(|l| 1.0 - l.price / mid <= band)
                .map(|l| l.amount)
                .sum();
            let ask_vol: f64 = asks
                .iter()
                .filter(|l| l.price / mid - 1.0 <= band)
                .map(|l| l.amount)
                .sum();
            let sum = bid_vol + ask_vol;
            if sum > 0.0 {
                (bid_vol - ask_vol) / sum * weight
            } else {
                0.0
            }
        })
        .sum::<f64>()
        * 100.0
}

fn significant_levels(levels: &[Level]) -> Vec<Level> {
    if levels.is_empty() {
        return Vec::new();
    }
    let mean = total(levels) / levels.len() as f64;
    levels
        .iter()
        .filter(|l| l.amount > mean * SIGNIFICANT_MULTIPLE)
        .copied()
        .collect()
}

/// Nearer strong support and farther strong resistance read bullish.
pub fn support_resistance_signal(bids: &[Level], asks: &[Level]) -> f64 {
    if bids.len() < MIN_LEVELS || asks.len() < MIN_LEVELS {
        return 0.0;
    }

    let mid = mid_price(bids, asks);
    if mid <= 0.0 {
        return 0.0;
    }

    let nearest = |levels: Vec<Level>, above: bool| {
        levels
            .into_iter()
            .filter(|l| if above { l.price > mid } else { l.price < mid })
            .min_by(|a, b| (a.price - mid).abs().total_cmp(&(b.price - mid).abs()))
    };

    let (Some(support), Some(resistance)) = (
        nearest(significant_levels(bids), false),
        nearest(significant_levels(asks), true),
    ) else {
        return 0.0;
    };

    let support_dist = (mid - support.price) / mid;
    let resistance_dist = (resistance.price - mid) / mid;
    if support_dist == 0.0 && resistance_dist == 0.0 {
        return 0.0;
    }

    let support_strength = (support.amount / LEVEL_STRENGTH_VOLUME).min(1.0);
    let resistance_strength = (resistance.amount / LEVEL_STRENGTH_VOLUME).min(1.0);

    let norm_support = support_dist.min(MAX_LEVEL_DISTANCE) / MAX_LEVEL_DISTANCE;
    let norm_resistance = resistance_dist.min(MAX_LEVEL_DISTANCE) / MAX_LEVEL_DISTANCE;

    let support_factor = (1.0 - norm_support) * support_strength;
    let resistance_factor = norm_resistance * resistance_strength;

    clamp_score((support_factor - resistance_factor) * 100.0)
}

/// Mean relative gap between consecutive levels of one sorted side.
fn average_gap(levels: &[Level]) -> f64 {
    let gaps: Vec<f64> = levels
        .windows(2)
        .take(SPREAD_LEVELS)
        .filter_map(|w| {
            let lower = w[0].price.min(w[1].price);
            (lower > 0.0).then(|| (w[0].price - w[1].price).abs() / lower)
        })
        .collect();
    if gaps.is_empty() {
        0.0
    } else {
        gaps.iter().sum::<f64>() / gaps.len() as f64
    }
}

/// Thinner ask ladder (wider ask gaps) with a tight top-of-book reads bullish.
pub fn spread_signal(bids: &[Level], asks: &[Level]) -> f64 {
    if bids.len() < MIN_LEVELS || asks.len() < MIN_LEVELS {
        return 0.0;
    }

    let mid = mid_price(bids, asks);
    if mid <= 0.0 {
        return 0.0;
    }
    let current_spread = (asks[0].price - bids[0].price) / mid;

    let bid_gap = average_gap(bids);
    let ask_gap = average_gap(asks);
    let ratio = if bid_gap > 0.0 && ask_gap > 0.0 {
        (ask_gap - bid_gap) / bid_gap.max(ask_gap)
    } else {
        0.0
    };

    let spread_factor = (current_spread * 100.0).min(1.0);
    clamp_score(ratio * (1.0 - spread_factor) * 50.0)
}

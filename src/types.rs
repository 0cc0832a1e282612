// =============================================================================
// Shared types used across the signal engine
// =============================================================================
//
// Every market-data sequence handed out by the storage layer is ordered
// newest-first.  Numeric fields that arrive from the exchange as decimal
// strings (order-book levels, funding rates, open interest) are kept textual
// here and parsed by the analyzers that consume them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub interval: String,
    /// Open time in milliseconds since the UNIX epoch.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Close time in milliseconds since the UNIX epoch.
    pub close_time: i64,
}

impl Candle {
    /// `true` when the candle closed below its open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// One price level of an order book, exactly as delivered upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: String,
    pub amount: String,
}

impl OrderBookLevel {
    pub fn new(price: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            amount: amount.into(),
        }
    }
}

/// Most recent order-book snapshot for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    /// Snapshot time in milliseconds since the UNIX epoch.
    pub timestamp: i64,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

/// A single funding-rate observation for a perpetual contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    pub symbol: String,
    /// Raw rate as a decimal string (e.g. "0.0001" = 0.01%).
    pub rate: String,
    pub timestamp: i64,
    pub next_funding_time: i64,
}

/// A single open-interest observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenInterest {
    pub symbol: String,
    /// Outstanding contracts as a decimal string.
    pub value: String,
    pub timestamp: i64,
}

/// Discrete recommendation derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl Recommendation {
    /// Suggested fraction of the maximum position for this recommendation.
    pub fn position_size(self) -> f64 {
        match self {
            Self::StrongBuy | Self::StrongSell => 1.0,
            Self::Buy | Self::Sell => 0.7,
            Self::Neutral => 0.0,
        }
    }
}

impl Default for Recommendation {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBuy => write!(f, "STRONG BUY"),
            Self::Buy => write!(f, "BUY"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Sell => write!(f, "SELL"),
            Self::StrongSell => write!(f, "STRONG SELL"),
        }
    }
}

/// The aggregated signal for one instrument in one cycle.
///
/// `signal_strength` is the raw weighted sum of the component scores and is
/// not clamped, so it can leave [-100, 100] when the configured weights sum
/// to more than one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub recommendation: Recommendation,
    pub signal_strength: f64,
    pub position_size: f64,
    pub current_price: f64,
    /// Component name (e.g. "technical") → that analyzer's score.
    pub components: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_sizes_follow_recommendation() {
        assert_eq!(Recommendation::StrongBuy.position_size(), 1.0);
        assert_eq!(Recommendation::Buy.position_size(), 0.7);
        assert_eq!(Recommendation::Neutral.position_size(), 0.0);
        assert_eq!(Recommendation::Sell.position_size(), 0.7);
        assert_eq!(Recommendation::StrongSell.position_size(), 1.0);
    }

    #[test]
    fn recommendation_serialises_screaming_snake() {
        let json = serde_json::to_string(&Recommendation::StrongSell).unwrap();
        assert_eq!(json, "\"STRONG_SELL\"");
        assert_eq!(Recommendation::StrongBuy.to_string(), "STRONG BUY");
    }

    #[test]
    fn bearish_candle_detection() {
        let c = Candle {
            symbol: "BTCUSDT".into(),
            interval: "1m".into(),
            open_time: 0,
            open: 101.0,
            high: 102.0,
            low: 99.0,
            close: 100.0,
            volume: 5.0,
            close_time: 59_999,
        };
        assert!(c.is_bearish());
    }
}

// =============================================================================
// Binance USDⓈ-M Futures REST Client — public market-data endpoints
// =============================================================================
//
// Only unauthenticated endpoints are used, so no API key or request signing
// is involved.  Every method returns the crate's own types; numeric fields the
// exchange sends as strings are kept as strings where the storage model does.
// =============================================================================

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::types::{Candle, FundingRate, OpenInterest, OrderBook, OrderBookLevel};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin client over `fapi.binance.com`.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceFuturesClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceFuturesClient initialised");
        Ok(Self { base_url, client })
    }

    /// GET `path` and return the JSON body, failing on non-2xx status.
    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {path} response"))?;

        if !status.is_success() {
            bail!("Binance GET {path} returned {status}: {body}");
        }
        Ok(body)
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    /// GET /fapi/v1/klines. Returned oldest first, as the exchange sends them.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let body = self
            .get_json(&format!(
                "/fapi/v1/klines?symbol={symbol}&interval={interval}&limit={limit}"
            ))
            .await?;
        let candles = parse_klines(symbol, interval, &body)?;
        debug!(count = candles.len(), "klines fetched");
        Ok(candles)
    }

    /// GET /fapi/v1/depth.
    #[instrument(skip(self), name = "binance::get_order_book")]
    pub async fn get_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBook> {
        let body = self
            .get_json(&format!("/fapi/v1/depth?symbol={symbol}&limit={depth}"))
            .await?;
        parse_depth(symbol, &body)
    }

    /// GET /fapi/v1/premiumIndex: last settled funding rate and the next
    /// funding time.
    #[instrument(skip(self), name = "binance::get_funding_rate")]
    pub async fn get_funding_rate(&self, symbol: &str) -> Result<FundingRate> {
        let body = self
            .get_json(&format!("/fapi/v1/premiumIndex?symbol={symbol}"))
            .await?;
        parse_premium_index(symbol, &body)
    }

    /// GET /fapi/v1/openInterest.
    #[instrument(skip(self), name = "binance::get_open_interest")]
    pub async fn get_open_interest(&self, symbol: &str) -> Result<OpenInterest> {
        let body = self
            .get_json(&format!("/fapi/v1/openInterest?symbol={symbol}"))
            .await?;
        parse_open_interest(symbol, &body)
    }

    // ── History (backfill only) ────────────────────────────────────────────

    /// GET /fapi/v1/fundingRate: settled funding rates, oldest first.
    #[instrument(skip(self), name = "binance::get_funding_history")]
    pub async fn get_funding_history(&self, symbol: &str, limit: usize) -> Result<Vec<FundingRate>> {
        let body = self
            .get_json(&format!("/fapi/v1/fundingRate?symbol={symbol}&limit={limit}"))
            .await?;
        parse_funding_history(symbol, &body)
    }

    /// GET /futures/data/openInterestHist: aggregated open interest per
    /// `period` bucket, oldest first.
    #[instrument(skip(self), name = "binance::get_open_interest_history")]
    pub async fn get_open_interest_history(
        &self,
        symbol: &str,
        period: &str,
        limit: usize,
    ) -> Result<Vec<OpenInterest>> {
        let body = self
            .get_json(&format!(
                "/futures/data/openInterestHist?symbol={symbol}&period={period}&limit={limit}"
            ))
            .await?;
        parse_open_interest_history(symbol, &body)
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

/// Binance sends most numbers as JSON strings.
fn parse_str_f64(val: &Value, name: &str) -> Result<f64> {
    match val {
        Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => bail!("field {name} has unexpected JSON type"),
    }
}

/// Decimal field kept textual; accepts either a string or a bare number.
fn decimal_string(val: &Value, name: &str) -> Result<String> {
    match val {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => bail!("field {name} missing or not a decimal"),
    }
}

/// Array-of-arrays kline payload:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, ...
pub(crate) fn parse_klines(symbol: &str, interval: &str, body: &Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;
    let mut candles = Vec::with_capacity(raw.len());

    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;
        if arr.len() < 7 {
            warn!(elements = arr.len(), "skipping malformed kline entry");
            continue;
        }

        candles.push(Candle {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            open_time: arr[0].as_i64().context("kline openTime missing")?,
            open: parse_str_f64(&arr[1], "open")?,
            high: parse_str_f64(&arr[2], "high")?,
            low: parse_str_f64(&arr[3], "low")?,
            close: parse_str_f64(&arr[4], "close")?,
            volume: parse_str_f64(&arr[5], "volume")?,
            close_time: arr[6].as_i64().context("kline closeTime missing")?,
        });
    }
    Ok(candles)
}

fn parse_levels(side: &Value, name: &str) -> Result<Vec<OrderBookLevel>> {
    side.as_array()
        .with_context(|| format!("depth field {name} is not an array"))?
        .iter()
        .map(|lvl| {
            let pair = lvl
                .as_array()
                .filter(|p| p.len() >= 2)
                .with_context(|| format!("malformed {name} level"))?;
            Ok(OrderBookLevel::new(
                decimal_string(&pair[0], "price")?,
                decimal_string(&pair[1], "amount")?,
            ))
        })
        .collect()
}

pub(crate) fn parse_depth(symbol: &str, body: &Value) -> Result<OrderBook> {
    let timestamp = body["E"]
        .as_i64()
        .or_else(|| body["T"].as_i64())
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    Ok(OrderBook {
        symbol: symbol.to_string(),
        timestamp,
        bids: parse_levels(&body["bids"], "bids")?,
        asks: parse_levels(&body["asks"], "asks")?,
    })
}

pub(crate) fn parse_premium_index(symbol: &str, body: &Value) -> Result<FundingRate> {
    // The endpoint returns an array when called without a symbol.
    let entry = match body {
        Value::Array(items) => items.first().context("premiumIndex response is empty")?,
        other => other,
    };

    Ok(FundingRate {
        symbol: symbol.to_string(),
        rate: decimal_string(&entry["lastFundingRate"], "lastFundingRate")?,
        timestamp: entry["time"]
            .as_i64()
            .unwrap_or_else(|| Utc::now().timestamp_millis()),
        next_funding_time: entry["nextFundingTime"].as_i64().unwrap_or(0),
    })
}

pub(crate) fn parse_open_interest(symbol: &str, body: &Value) -> Result<OpenInterest> {
    Ok(OpenInterest {
        symbol: symbol.to_string(),
        value: decimal_string(&body["openInterest"], "openInterest")?,
        timestamp: body["time"]
            .as_i64()
            .unwrap_or_else(|| Utc::now().timestamp_millis()),
    })
}

pub(crate) fn parse_funding_history(symbol: &str, body: &Value) -> Result<Vec<FundingRate>> {
    body.as_array()
        .context("fundingRate response is not an array")?
        .iter()
        .map(|entry| {
            Ok(FundingRate {
                symbol: symbol.to_string(),
                rate: decimal_string(&entry["fundingRate"], "fundingRate")?,
                timestamp: entry["fundingTime"].as_i64().context("fundingTime missing")?,
                next_funding_time: 0,
            })
        })
        .collect()
}

pub(crate) fn parse_open_interest_history(symbol: &str, body: &Value) -> Result<Vec<OpenInterest>> {
    body.as_array()
        .context("openInterestHist response is not an array")?
        .iter()
        .map(|entry| {
            Ok(OpenInterest {
                symbol: symbol.to_string(),
                value: decimal_string(&entry["sumOpenInterest"], "sumOpenInterest")?,
                timestamp: entry["timestamp"].as_i64().context("timestamp missing")?,
            })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn klines_parse() {
        let body = json!([
            [1700000000000_i64, "37000.0", "37050.0", "36990.0", "37020.0", "123.4", 1700000059999_i64, "0", 10, "0", "0", "0"],
            [1700000060000_i64, "37020.0", "37060.0", "37000.0", "37010.0", "99.9", 1700000119999_i64, "0", 8, "0", "0", "0"]
        ]);
        let candles = parse_klines("BTCUSDT", "1m", &body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, 1_700_000_000_000);
        assert!((candles[1].close - 37010.0).abs() < f64::EPSILON);
        assert_eq!(candles[1].interval, "1m");
    }

    #[test]
    fn klines_reject_non_array() {
        assert!(parse_klines("BTCUSDT", "1m", &json!({"code": -1121})).is_err());
    }

    #[test]
    fn depth_keeps_levels_textual() {
        let body = json!({
            "lastUpdateId": 1,
            "E": 1700000000123_i64,
            "T": 1700000000100_i64,
            "bids": [["37000.10", "1.500"], ["36999.90", "0.2"]],
            "asks": [["37000.20", "0.75"]]
        });
        let book = parse_depth("BTCUSDT", &body).unwrap();
        assert_eq!(book.timestamp, 1_700_000_000_123);
        assert_eq!(book.bids[0], OrderBookLevel::new("37000.10", "1.500"));
        assert_eq!(book.asks.len(), 1);
    }

    #[test]
    fn premium_index_parse() {
        let body = json!({
            "symbol": "BTCUSDT",
            "markPrice": "37000.0",
            "lastFundingRate": "0.00010000",
            "nextFundingTime": 1700006400000_i64,
            "time": 1700000000000_i64
        });
        let fr = parse_premium_index("BTCUSDT", &body).unwrap();
        assert_eq!(fr.rate, "0.00010000");
        assert_eq!(fr.next_funding_time, 1_700_006_400_000);
    }

    #[test]
    fn open_interest_parse() {
        let body = json!({"openInterest": "10659.509", "symbol": "BTCUSDT", "time": 1589437530011_i64});
        let oi = parse_open_interest("BTCUSDT", &body).unwrap();
        assert_eq!(oi.value, "10659.509");
        assert_eq!(oi.timestamp, 1_589_437_530_011);
    }

    #[test]
    fn open_interest_missing_field_is_error() {
        assert!(parse_open_interest("BTCUSDT", &json!({"symbol": "BTCUSDT"})).is_err());
    }

    #[test]
    fn funding_history_parse() {
        let body = json!([
            {"symbol": "BTCUSDT", "fundingRate": "-0.00003", "fundingTime": 1700000000000_i64, "markPrice": "37000"},
            {"symbol": "BTCUSDT", "fundingRate": "0.00010", "fundingTime": 1700028800000_i64, "markPrice": "37100"}
        ]);
        let rates = parse_funding_history("BTCUSDT", &body).unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].rate, "-0.00003");
        assert_eq!(rates[1].timestamp, 1_700_028_800_000);
    }

    #[test]
    fn open_interest_history_parse() {
        let body = json!([
            {"symbol": "BTCUSDT", "sumOpenInterest": "20403.63", "sumOpenInterestValue": "150570784.07", "timestamp": 1583127900000_i64}
        ]);
        let series = parse_open_interest_history("BTCUSDT", &body).unwrap();
        assert_eq!(series[0].value, "20403.63");
        assert_eq!(series[0].timestamp, 1_583_127_900_000);
    }
}

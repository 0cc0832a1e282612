// =============================================================================
// Exchange Module — Binance USDⓈ-M Futures market data
// =============================================================================

pub mod client;
pub mod collector;

pub use collector::MarketDataCollector;

// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator math.  Every function here takes its input
// oldest-first; callers holding newest-first storage data reverse it before
// calling in.  Insufficient data is reported as `None` (or `0.0` for the
// slope helper) rather than panicking.

pub mod atr;
pub mod bollinger;
pub mod ichimoku;
pub mod macd;
pub mod regression;
pub mod rsi;

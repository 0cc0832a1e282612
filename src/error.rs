// =============================================================================
// Error taxonomy for the analyzers and the signal engine
// =============================================================================
//
// Analyzer failures are never fatal: the engine converts every variant of
// `AnalyzerError` into a neutral score and logs it.  The only error that can
// abort a whole cycle is `EngineError::Cancelled`.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("insufficient {what}: {available} available, {required} required")]
    InsufficientData {
        what: &'static str,
        required: usize,
        available: usize,
    },

    #[error("failed to parse {field} value '{value}'")]
    Parse { field: &'static str, value: String },

    #[error("order book has no levels on at least one side")]
    EmptyOrderBook,

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("analyzer did not finish within {0:?}")]
    Timeout(Duration),

    #[error("analyzer task aborted: {0}")]
    Aborted(String),
}

impl AnalyzerError {
    /// Short machine-readable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Parse { .. } => "parse",
            Self::EmptyOrderBook => "empty_order_book",
            Self::Storage(_) => "storage",
            Self::Timeout(_) => "timeout",
            Self::Aborted(_) => "aborted",
        }
    }

    pub(crate) fn insufficient(what: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            what,
            required,
            available,
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("signal cycle cancelled before completion")]
    Cancelled,
}

/// Parse a decimal string delivered by the exchange.
pub(crate) fn parse_decimal(field: &'static str, value: &str) -> Result<f64, AnalyzerError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AnalyzerError::Parse {
            field,
            value: value.to_string(),
        })
}

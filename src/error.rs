use std::io;

use thiserror::Error;

/// Failures raised by the stock ledger.
#[derive(Error, Debug)]
pub enum StockError {
    /// Malformed or empty input, e.g. an `addstock` without codes
    #[error("invalid input: {0}")]
    Validation(String),

    /// Unknown item, or an item whose codes have all been dispensed
    #[error("no stock for item: {0}")]
    NotFound(String),

    #[error("stock file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stock file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StockError {
    /// Whether the failure came from the backing file rather than the request.
    pub fn is_storage(&self) -> bool {
        matches!(self, StockError::Io(_) | StockError::Json(_))
    }
}

/// The platform refused a direct message, e.g. the recipient blocks DMs.
#[derive(Error, Debug)]
#[error("could not deliver direct message: {0}")]
pub struct DeliveryFailure(pub String);

/// A command line whose quoting does not close properly.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteError {
    #[error("Expected a closing quote")]
    Unclosed,

    #[error("Expected a space after the closing quote")]
    TextAfterQuote,
}

/// Startup configuration problems. All of them halt the process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing bot token in {0}")]
    MissingToken(&'static str),

    #[error("{var} must be a whole number no larger than {max}, got {value:?}")]
    InvalidNumber {
        var: &'static str,
        value: String,
        max: u64,
    },

    #[error("{var} must be one of `user` or `item`, got {value:?}")]
    InvalidScope { var: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, StockError>;

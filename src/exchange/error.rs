//! Exchange error taxonomy

use thiserror::Error;

/// Errors from exchange calls
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Request weight or order rate exceeded
    #[error("Rate limited (code {code}): {message}")]
    RateLimited { code: i64, message: String },
    #[error("Request timed out")]
    Timeout,
    #[error("Connection error: {0}")]
    Connection(String),
    /// Invalid credentials or trading not enabled
    #[error("Permission denied (code {code}): {message}")]
    Permission { code: i64, message: String },
    #[error("Insufficient margin: {0}")]
    InsufficientMargin(String),
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    /// Any other API-level rejection
    #[error("Request rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ExchangeError {
    /// Map an API error code to its category
    pub fn from_api(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            -1003 | -1015 => ExchangeError::RateLimited { code, message },
            -1022 | -2014 | -2015 => ExchangeError::Permission { code, message },
            -2019 => ExchangeError::InsufficientMargin(message),
            -1121 => ExchangeError::UnknownSymbol(message),
            _ => ExchangeError::Rejected { code, message },
        }
    }

    /// Worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::RateLimited { .. } | ExchangeError::Timeout | ExchangeError::Connection(_)
        )
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ExchangeError::RateLimited { .. })
    }

    /// Retrying cannot succeed and the process should stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExchangeError::Permission { .. })
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExchangeError::Timeout
        } else if e.is_decode() {
            ExchangeError::Decode(e.to_string())
        } else {
            ExchangeError::Connection(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        ExchangeError::Decode(e.to_string())
    }
}

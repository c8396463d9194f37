//! Data capture module
//!
//! Pages historical candles from the exchange and caches them in Parquet
//! so backtests can replay without network access.

mod history;
mod parquet;

pub use history::HistoryLoader;
pub use parquet::{candle_schema, CandleReader, CandleWriter};

use thiserror::Error;

/// Candle cache errors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Invalid decimal: {0}")]
    Decimal(#[from] rust_decimal::Error),
    /// Column missing or of the wrong type
    #[error("Invalid {0} column")]
    Schema(&'static str),
    #[error("Invalid timestamp {0}")]
    Timestamp(i64),
}

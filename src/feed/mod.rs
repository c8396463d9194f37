//! Candle feed module
//!
//! Candle types and the post-ingest invariant: strictly increasing
//! timestamps with no duplicates.

mod types;

pub use types::{Candle, Interval};

/// Sort candles by timestamp and drop duplicate timestamps.
///
/// When two candles share a timestamp the later-received one wins, since
/// exchanges revise the still-open candle until it closes.
pub fn normalize_candles(mut candles: Vec<Candle>) -> Vec<Candle> {
    // Stable sort keeps arrival order within equal timestamps
    candles.sort_by_key(|c| c.timestamp);

    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => out.push(candle),
        }
    }
    out
}

/// Check the post-ingest invariant
pub fn is_normalized(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

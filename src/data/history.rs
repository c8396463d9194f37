//! Paged historical candle fetch

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::time::sleep;

use crate::config::DataConfig;
use crate::exchange::{ExchangeError, MarketData, RetryPolicy};
use crate::feed::{normalize_candles, Candle, Interval};

/// Split `[start, end]` into windows of at most `page_size` candles
pub(crate) fn page_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Interval,
    page_size: u32,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let span = interval.duration() * page_size.max(1) as i32;
    let mut windows = vec![];
    let mut cursor = start;
    while cursor <= end {
        let page_end = (cursor + span - Duration::milliseconds(1)).min(end);
        windows.push((cursor, page_end));
        cursor += span;
    }
    windows
}

/// Fetches a contiguous candle history in pages.
///
/// Pages are requested concurrently up to `fetch_concurrency`; each request
/// goes through the retry policy and is followed by a short pause.
pub struct HistoryLoader<'a, M> {
    market: &'a M,
    retry: RetryPolicy,
    page_size: u32,
    concurrency: usize,
    delay: std::time::Duration,
}

impl<'a, M: MarketData> HistoryLoader<'a, M> {
    pub fn new(market: &'a M, config: &DataConfig, retry: RetryPolicy) -> Self {
        Self {
            market,
            retry,
            page_size: config.page_size.clamp(1, 1000),
            concurrency: config.fetch_concurrency.max(1),
            delay: std::time::Duration::from_millis(config.request_delay_ms),
        }
    }

    /// Deduplicated, time-sorted candles opening in `[start, end]`
    pub async fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let windows = page_windows(start, end, interval, self.page_size);
        tracing::info!(
            symbol,
            %interval,
            %start,
            %end,
            pages = windows.len(),
            "Fetching candle history"
        );

        let pages: Vec<Result<Vec<Candle>, ExchangeError>> = stream::iter(windows)
            .map(|(from, to)| async move {
                let page = self
                    .retry
                    .run("klines", || {
                        self.market
                            .get_candles_between(symbol, interval, from, to, self.page_size)
                    })
                    .await;
                sleep(self.delay).await;
                page
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut candles = Vec::new();
        for page in pages {
            candles.extend(page?);
        }
        let candles = normalize_candles(candles);

        tracing::info!(symbol, count = candles.len(), "Candle history loaded");
        Ok(candles)
    }
}

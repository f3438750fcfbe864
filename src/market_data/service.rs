// =============================================================================
// Market Data Service
// =============================================================================
//
// Owns two independent (client, rate limiter) pairs — one per Bybit category
// — because `category` is a mandatory per-call parameter and mixing spot and
// linear requests onto one limiter would under- or over-throttle both.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::warn;

use crate::error::EngineError;
use crate::exchange::{BybitClient, RateLimitTracker, Ticker};
use crate::market_data::candle::Candle;
use crate::market_data::symbol_registry;
use crate::types::{Category, Timeframe};

/// Requests within a batch run concurrently; batches are spaced out to stay
/// under the exchange's rate limit.
const BATCH_SIZE: usize = 8;
const BATCH_PAUSE: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MarketDataService {
    spot_client: Arc<BybitClient>,
    spot_limiter: Arc<RateLimitTracker>,
    linear_client: Arc<BybitClient>,
    linear_limiter: Arc<RateLimitTracker>,
}

impl MarketDataService {
    pub fn new(spot_client: BybitClient, linear_client: BybitClient) -> Self {
        Self {
            spot_client: Arc::new(spot_client),
            spot_limiter: Arc::new(RateLimitTracker::new(200)),
            linear_client: Arc::new(linear_client),
            linear_limiter: Arc::new(RateLimitTracker::new(200)),
        }
    }

    fn client_for(&self, for_spot: bool) -> (&Arc<BybitClient>, &Arc<RateLimitTracker>) {
        if for_spot {
            (&self.spot_client, &self.spot_limiter)
        } else {
            (&self.linear_client, &self.linear_limiter)
        }
    }

    pub fn get_all_usdt_pairs(&self) -> Vec<String> {
        symbol_registry::get_all_usdt_pairs()
    }

    pub fn get_top_trading_pairs(&self, limit: usize) -> Vec<String> {
        symbol_registry::get_top_trading_pairs(limit)
    }

    pub async fn get_ohlcv(&self, symbol: &str, timeframe: Timeframe, limit: u32, for_spot: bool) -> Result<Vec<Candle>, EngineError> {
        let (client, limiter) = self.client_for(for_spot);
        let category = if for_spot { Category::Spot } else { Category::Linear };
        let wait = limiter.pace(now_ms());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        client.get_klines(category, symbol, timeframe.as_bybit_interval(), limit).await
    }

    pub async fn get_market_data(&self, symbol: &str, for_spot: bool) -> Result<Ticker, EngineError> {
        let (client, limiter) = self.client_for(for_spot);
        let category = if for_spot { Category::Spot } else { Category::Linear };
        let wait = limiter.pace(now_ms());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        client.get_ticker(category, symbol).await
    }

    /// Fetches candles for every symbol, batched to respect rate limits.
    /// A symbol whose request times out or errors contributes an empty
    /// candle list rather than aborting the whole batch — per spec, a single
    /// bad symbol must never block the rest of the universe.
    pub async fn batch_fetch_ohlcv(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        limit: u32,
        for_spot: bool,
    ) -> Vec<(String, Vec<Candle>)> {
        let mut results = Vec::with_capacity(symbols.len());

        for chunk in symbols.chunks(BATCH_SIZE) {
            let futures = chunk.iter().map(|symbol| {
                let symbol = symbol.clone();
                async move {
                    let outcome = tokio::time::timeout(REQUEST_TIMEOUT, self.get_ohlcv(&symbol, timeframe, limit, for_spot)).await;
                    let candles = match outcome {
                        Ok(Ok(candles)) => candles,
                        Ok(Err(e)) => {
                            warn!(symbol = %symbol, error = %e, "OHLCV fetch failed, recording empty candle set");
                            Vec::new()
                        }
                        Err(_) => {
                            warn!(symbol = %symbol, "OHLCV fetch timed out, recording empty candle set");
                            Vec::new()
                        }
                    };
                    (symbol, candles)
                }
            });
            results.extend(join_all(futures).await);

            if results.len() < symbols.len() {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
        }

        results
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> MarketDataService {
        MarketDataService::new(BybitClient::mainnet(), BybitClient::mainnet())
    }

    #[test]
    fn exposes_full_usdt_universe() {
        let svc = service();
        assert!(svc.get_all_usdt_pairs().contains(&"BTCUSDT".to_string()));
    }

    #[test]
    fn top_pairs_respects_limit() {
        let svc = service();
        assert_eq!(svc.get_top_trading_pairs(3).len(), 3);
    }
}

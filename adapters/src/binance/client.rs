use std::time::Duration;

use async_trait::async_trait;
use corelib::{Bar, Interval};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::errors::BinanceError;
use super::parser::parse_kline_rows;
use crate::error::FeedError;
use crate::loader::HistoricalLoader;

/// Largest `limit` the klines endpoint accepts.
pub const MAX_KLINES_LIMIT: usize = 1000;

/// REST client for the kline snapshot endpoint.
#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    url: String,
}

impl BinanceClient {
    /// `url` is the API root, e.g. `https://api.binance.com/api/v3`.
    pub fn new(url: String) -> Result<Self, BinanceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(self), fields(interval = %interval), level = "debug")]
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Bar>, BinanceError> {
        let url = format!("{}/klines", self.url);
        let query = klines_query(symbol, interval, limit);

        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;

        let rows: Vec<Value> = resp.json().await?;
        let bars = parse_kline_rows(&rows, common::time::now_ms());

        debug!(rows = rows.len(), bars = bars.len(), "binance klines fetched");

        Ok(bars)
    }
}

#[async_trait]
impl HistoricalLoader for BinanceClient {
    async fn load(
        &self,
        upstream_symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Bar>, FeedError> {
        let bars = self
            .fetch_klines(upstream_symbol, interval, limit)
            .await
            .map_err(|e| FeedError::UpstreamUnavailable(e.to_string()))?;

        if bars.is_empty() {
            return Err(FeedError::UpstreamUnavailable(format!(
                "no closed klines returned for {upstream_symbol}"
            )));
        }

        Ok(bars)
    }
}

/// Query for `/klines`. `limit` is clamped to `1..=MAX_KLINES_LIMIT`; larger
/// windows are seeded with the newest `MAX_KLINES_LIMIT` bars.
fn klines_query(symbol: &str, interval: Interval, limit: usize) -> [(&'static str, String); 3] {
    [
        ("symbol", symbol.to_string()),
        ("interval", interval.upstream_code().to_string()),
        ("limit", limit.clamp(1, MAX_KLINES_LIMIT).to_string()),
    ]
}

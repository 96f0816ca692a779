//! REST client for depth snapshots

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MAX_SNAPSHOT_LIMIT;
use crate::error::{MarketDataError, Result};
use crate::parser::OrderBookSnapshot;
use crate::sync::SnapshotSource;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Binance spot REST client
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RestClient {
    /// Create a client for an endpoint such as `https://api.binance.com/api/v3`
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn depth_url(&self, symbol: &str, limit: u16) -> String {
        format!(
            "{}/depth?symbol={}&limit={}",
            self.endpoint,
            symbol.to_uppercase(),
            limit
        )
    }
}

#[async_trait]
impl SnapshotSource for RestClient {
    async fn fetch_snapshot(&self, symbol: &str, limit: u16) -> Result<OrderBookSnapshot> {
        if symbol.is_empty() {
            return Err(MarketDataError::InvalidArgument(
                "symbol must not be empty".to_string(),
            ));
        }
        if limit == 0 || limit > MAX_SNAPSHOT_LIMIT {
            return Err(MarketDataError::InvalidArgument(format!(
                "snapshot limit must be within 1..={}, got {}",
                MAX_SNAPSHOT_LIMIT, limit
            )));
        }

        let url = self.depth_url(symbol, limit);
        info!(symbol = %symbol, url = %url, "Fetching order book snapshot");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::RestApiError(format!(
                "snapshot request failed with {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        let snapshot: OrderBookSnapshot = serde_json::from_str(&body)?;
        debug!(
            symbol = %symbol,
            update_id = snapshot.last_update_id,
            "Snapshot received"
        );
        Ok(snapshot)
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::MarketDataProvider;
use crate::error::UpstreamError;
use crate::types::{CoinDetail, ContractInfo, MarketQuote};

struct TtlCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    async fn insert(&self, key: String, value: V) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        entries.insert(key, (Instant::now(), value));
    }
}

/// Time-bounded caches in front of a [`MarketDataProvider`].
///
/// Entries expire strictly after their TTL and failures are never cached, so
/// an upstream outage yields empty results rather than stale ones. Concurrent
/// misses on the same key each go upstream.
pub struct MarketDataCache {
    provider: Arc<dyn MarketDataProvider>,
    markets: TtlCache<Vec<MarketQuote>>,
    details: TtlCache<CoinDetail>,
}

impl MarketDataCache {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        markets_ttl: Duration,
        detail_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            markets: TtlCache::new(markets_ttl),
            details: TtlCache::new(detail_ttl),
        }
    }

    /// Cache key of an id set: sorted, de-duplicated and comma-joined.
    fn markets_key(ids: &[String]) -> Vec<String> {
        let mut ids: Vec<String> = ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Market quotes for `ids`, empty on provider failure.
    pub async fn markets(&self, ids: &[String]) -> Vec<MarketQuote> {
        let ids = Self::markets_key(ids);
        if ids.is_empty() {
            return Vec::new();
        }
        let key = ids.join(",");

        if let Some(quotes) = self.markets.get(&key).await {
            debug!(%key, "markets cache hit");
            return quotes;
        }

        match self.provider.markets(&ids).await {
            Ok(quotes) => {
                self.markets.insert(key, quotes.clone()).await;
                quotes
            }
            Err(e) => {
                warn!(%key, "markets fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Coin detail for `coin_id`, `None` on provider failure.
    pub async fn coin_detail(&self, coin_id: &str) -> Option<CoinDetail> {
        if let Some(detail) = self.details.get(coin_id).await {
            debug!(coin_id, "coin detail cache hit");
            return Some(detail);
        }

        match self.provider.coin_detail(coin_id).await {
            Ok(detail) => {
                self.details.insert(coin_id.to_string(), detail.clone()).await;
                Some(detail)
            }
            Err(e) => {
                warn!(coin_id, "coin detail failed: {}", e);
                None
            }
        }
    }

    /// Uncached per-contract lookup.
    pub async fn contract_info(&self, platform: &str, contract: &str) -> Option<ContractInfo> {
        self.provider
            .contract_info(platform, contract)
            .await
            .inspect_err(|e| debug!(platform, contract, "contract lookup failed: {}", e))
            .ok()
    }

    /// Uncached search passthrough.
    pub async fn search(&self, query: &str) -> Result<serde_json::Value, UpstreamError> {
        self.provider.search(query).await
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Settings;
use crate::error::UpstreamError;
use crate::types::{CoinDetail, ContractInfo, MarketQuote};

/// Source of prices and coin metadata.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// USD market listing for the given coin ids.
    async fn markets(&self, ids: &[String]) -> Result<Vec<MarketQuote>, UpstreamError>;

    /// Coin detail including the cross-chain contract map.
    async fn coin_detail(&self, coin_id: &str) -> Result<CoinDetail, UpstreamError>;

    /// Token record for a contract on a market platform.
    async fn contract_info(
        &self,
        platform: &str,
        contract: &str,
    ) -> Result<ContractInfo, UpstreamError>;

    /// Free-text coin search, returned as the provider sends it.
    async fn search(&self, query: &str) -> Result<serde_json::Value, UpstreamError>;
}

/// CoinGecko v3 REST client.
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    market_timeout: Duration,
    lookup_timeout: Duration,
}

impl CoinGeckoClient {
    pub fn new(settings: &Settings) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("portfolio-aggregator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_error = |reason: String| UpstreamError::BaseUrl {
            url: settings.coingecko_api.clone(),
            reason,
        };
        let base_url = Url::parse(&settings.coingecko_api).map_err(|e| base_error(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(base_error("not a base url".to_string()));
        }

        Ok(Self {
            http,
            base_url,
            api_key: settings.coingecko_api_key.clone(),
            market_timeout: settings.market_timeout(),
            lookup_timeout: settings.lookup_timeout(),
        })
    }

    /// Base URL extended by `segments`, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::BaseUrl {
                url: self.base_url.to_string(),
                reason: "not a base url".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<T, UpstreamError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "market provider request");

        let mut request = self.http.get(url).query(query).timeout(timeout);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoClient {
    async fn markets(&self, ids: &[String]) -> Result<Vec<MarketQuote>, UpstreamError> {
        let joined = ids.join(",");
        let per_page = ids.len().to_string();
        let query = [
            ("vs_currency", "usd"),
            ("ids", joined.as_str()),
            ("order", "market_cap_desc"),
            ("per_page", per_page.as_str()),
            ("page", "1"),
            ("sparkline", "false"),
            ("price_change_percentage", "24h"),
        ];
        self.get_json(&["coins", "markets"], &query, self.market_timeout)
            .await
    }

    async fn coin_detail(&self, coin_id: &str) -> Result<CoinDetail, UpstreamError> {
        let query = [
            ("localization", "false"),
            ("tickers", "false"),
            ("market_data", "false"),
            ("community_data", "false"),
            ("developer_data", "false"),
            ("sparkline", "false"),
        ];
        self.get_json(&["coins", coin_id], &query, self.market_timeout)
            .await
    }

    async fn contract_info(
        &self,
        platform: &str,
        contract: &str,
    ) -> Result<ContractInfo, UpstreamError> {
        self.get_json(
            &["coins", platform, "contract", contract],
            &[],
            self.lookup_timeout,
        )
        .await
    }

    async fn search(&self, query: &str) -> Result<serde_json::Value, UpstreamError> {
        self.get_json(&["search"], &[("query", query)], self.lookup_timeout)
            .await
    }
}

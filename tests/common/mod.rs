//! In-memory stand-ins for the chain RPCs and the market provider.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use portfolio_aggregator::{
    AggregatorService, BalanceSource, ChainEndpoint, ChainRegistry, ClientHandle, CoinDetail,
    ConnectError, Connector, ContractInfo, EndpointMap, MarketDataCache, MarketDataProvider,
    MarketQuote, Unavailable, UpstreamError,
};
use serde_json::json;

pub const ADDRESS: &str = "0xabc0000000000000000000000000000000000001";
pub const USDC_ETH: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

/// Fixed balances for one chain.
pub struct MockChain {
    pub key: String,
    pub native: Result<f64, Unavailable>,
    pub tokens: HashMap<String, f64>,
}

impl MockChain {
    pub fn new(key: &str, native: Result<f64, Unavailable>) -> Self {
        Self {
            key: key.to_string(),
            native,
            tokens: HashMap::new(),
        }
    }

    pub fn with_token(mut self, contract: &str, balance: f64) -> Self {
        self.tokens.insert(contract.to_lowercase(), balance);
        self
    }
}

#[async_trait]
impl BalanceSource for MockChain {
    fn chain_key(&self) -> &str {
        &self.key
    }

    async fn fetch_native(&self, _address: &str) -> Result<f64, Unavailable> {
        self.native.clone()
    }

    async fn fetch_token_balance(&self, contract: &str, _address: &str) -> Result<f64, Unavailable> {
        self.tokens
            .get(&contract.to_lowercase())
            .copied()
            .ok_or_else(|| Unavailable::Rpc(format!("execution reverted for {}", contract)))
    }
}

/// Hands out the prepared [`MockChain`] for each key, and fails for the rest.
#[derive(Default)]
pub struct MockConnector {
    chains: HashMap<String, ClientHandle>,
}

impl MockConnector {
    pub fn with_chain(mut self, chain: MockChain) -> Self {
        self.chains.insert(chain.key.clone(), Arc::new(chain));
        self
    }
}

impl Connector for MockConnector {
    fn connect(&self, endpoint: &ChainEndpoint) -> Result<ClientHandle, ConnectError> {
        self.chains
            .get(&endpoint.key)
            .cloned()
            .ok_or_else(|| ConnectError::Setup(format!("connection refused: {}", endpoint.rpc_url)))
    }
}

#[derive(Default)]
pub struct MockProvider {
    pub quotes: Vec<MarketQuote>,
    pub details: HashMap<String, CoinDetail>,
    pub contracts: HashMap<(String, String), ContractInfo>,
    pub failing: bool,
    pub market_calls: AtomicUsize,
}

impl MockProvider {
    pub fn quote(mut self, id: &str, symbol: &str, price: f64) -> Self {
        self.quotes.push(MarketQuote {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: id.to_string(),
            current_price: Some(price),
            price_change_percentage_24h: Some(1.25),
            image: Some(format!("https://img.example/{}.png", id)),
        });
        self
    }

    pub fn platforms(mut self, id: &str, platforms: &[(&str, &str)]) -> Self {
        let detail = CoinDetail {
            id: id.to_string(),
            platforms: platforms
                .iter()
                .map(|(p, a)| (p.to_string(), Some(a.to_string())))
                .collect(),
            ..CoinDetail::default()
        };
        self.details.insert(id.to_string(), detail);
        self
    }

    pub fn contract(mut self, platform: &str, contract: &str, symbol: &str, price: f64) -> Self {
        let info: ContractInfo = serde_json::from_value(json!({
            "id": symbol.to_lowercase(),
            "symbol": symbol.to_lowercase(),
            "name": format!("{} Token", symbol),
            "image": {"small": format!("https://img.example/{}.png", symbol)},
            "market_data": {"current_price": {"usd": price}, "price_change_percentage_24h": 0.5}
        }))
        .expect("valid contract info");
        self.contracts
            .insert((platform.to_string(), contract.to_lowercase()), info);
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn markets(&self, ids: &[String]) -> Result<Vec<MarketQuote>, UpstreamError> {
        self.market_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(UpstreamError::Status(503));
        }
        Ok(self
            .quotes
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn coin_detail(&self, coin_id: &str) -> Result<CoinDetail, UpstreamError> {
        if self.failing {
            return Err(UpstreamError::Status(503));
        }
        self.details
            .get(coin_id)
            .cloned()
            .ok_or(UpstreamError::Status(404))
    }

    async fn contract_info(
        &self,
        platform: &str,
        contract: &str,
    ) -> Result<ContractInfo, UpstreamError> {
        if self.failing {
            return Err(UpstreamError::Status(503));
        }
        self.contracts
            .get(&(platform.to_string(), contract.to_lowercase()))
            .cloned()
            .ok_or(UpstreamError::Status(404))
    }

    async fn search(&self, query: &str) -> Result<serde_json::Value, UpstreamError> {
        if self.failing {
            return Err(UpstreamError::Status(503));
        }
        Ok(json!({"coins": [{"id": query, "symbol": query}]}))
    }
}

pub fn endpoints(keys: &[&str]) -> EndpointMap {
    keys.iter()
        .map(|k| (k.to_string(), format!("https://{}.rpc.example", k)))
        .collect()
}

pub fn service(
    keys: &[&str],
    connector: MockConnector,
    provider: MockProvider,
) -> AggregatorService {
    let registry = ChainRegistry::new(endpoints(keys), Box::new(connector));
    let market = MarketDataCache::new(
        Arc::new(provider),
        Duration::from_secs(12),
        Duration::from_secs(60),
    );
    AggregatorService::new(Arc::new(registry), Arc::new(market))
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Ethereum at $3000 holding 1.5 ETH and 100 USDC.
pub fn ethereum_fixture() -> AggregatorService {
    let connector = MockConnector::default()
        .with_chain(MockChain::new("ethereum", Ok(1.5)).with_token(USDC_ETH, 100.0));
    let provider = MockProvider::default()
        .quote("ethereum", "eth", 3000.0)
        .quote("usd-coin", "usdc", 1.0)
        .quote("solana", "sol", 150.0)
        .platforms(
            "usd-coin",
            &[("polygon-pos", "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359"), ("ethereum", USDC_ETH)],
        );
    service(&["ethereum", "bsc", "solana"], connector, provider)
}

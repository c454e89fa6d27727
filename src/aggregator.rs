//! Portfolio valuation for one address on one chain.
//!
//! The [`AggregatorService`] joins three sources for every request: the
//! chain's native balance, balances of coins named by market id (resolved to
//! a token contract first), and balances of explicitly listed token
//! contracts. Each line is priced from the market cache.
//!
//! Aggregation never fails. A source that cannot answer produces a zero
//! balance and a message in [`AggregationResult::errors`], so callers always
//! get a complete result.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::chain::ClientHandle;
use crate::chains::{
    chain_for_platform, native_chain_of_coin, native_coin_for_chain, native_ticker,
    platform_for_chain,
};
use crate::config::{default_endpoints, Settings};
use crate::error::{Unavailable, UpstreamError};
use crate::market::{CoinGeckoClient, MarketDataCache};
use crate::registry::ChainRegistry;
use crate::resolver::ContractResolver;
use crate::types::{usd_value, AggregationResult, BalanceLine, MarketQuote, TokenSpec};

/// Owns the endpoint registry and market caches shared by all requests.
pub struct AggregatorService {
    registry: Arc<ChainRegistry>,
    market: Arc<MarketDataCache>,
    resolver: ContractResolver,
}

impl AggregatorService {
    pub fn new(registry: Arc<ChainRegistry>, market: Arc<MarketDataCache>) -> Self {
        let resolver = ContractResolver::new(market.clone());
        Self {
            registry,
            market,
            resolver,
        }
    }

    /// Service backed by CoinGecko and the RPC endpoints configured through
    /// the environment and the chain config file.
    pub fn from_settings(settings: &Settings) -> Result<Self, UpstreamError> {
        let provider = CoinGeckoClient::new(settings)?;
        let market = MarketDataCache::new(
            Arc::new(provider),
            settings.markets_ttl(),
            settings.coin_detail_ttl(),
        );
        let registry = ChainRegistry::from_env(
            default_endpoints(),
            settings.resolve_chain_config_path(),
            settings.rpc_timeout(),
            settings.chain_refresh_interval(),
        );
        Ok(Self::new(Arc::new(registry), Arc::new(market)))
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn market(&self) -> &MarketDataCache {
        &self.market
    }

    /// Value `address` on `chain`.
    ///
    /// `tokens` keeps the order of `coin_ids` (after de-duplication) followed
    /// by the explicit `tokens` in input order. Coins native to `chain` are
    /// left out since the native line already counts them.
    pub async fn aggregate(
        &self,
        chain: &str,
        address: &str,
        coin_ids: &[String],
        tokens: &[TokenSpec],
    ) -> AggregationResult {
        let mut result = AggregationResult::new(chain, address);

        let (native, error) = self.native_line(chain, address).await;
        result.native = Some(native);
        result.errors.extend(error);

        let coin_ids = dedupe_coin_ids(coin_ids, chain);
        let quotes = self.quotes_by_id(&coin_ids).await;
        let coin_lines = join_all(
            coin_ids
                .iter()
                .map(|id| self.coin_line(id, quotes.get(id), address)),
        )
        .await;

        let token_lines = join_all(
            tokens
                .iter()
                .map(|token| self.explicit_line(token, chain, address)),
        )
        .await;

        for (line, error) in coin_lines.into_iter().chain(token_lines.into_iter().flatten()) {
            result.tokens.push(line);
            result.errors.extend(error);
        }

        result.total_usd = result.compute_total();
        info!(
            chain,
            address,
            tokens = result.tokens.len(),
            errors = result.errors.len(),
            total_usd = result.total_usd,
            "aggregated balance"
        );
        result
    }

    /// Run [`aggregate`](Self::aggregate) for every chain/address pair.
    ///
    /// Every chain receives all `coin_ids`, and the explicit tokens whose
    /// `chain` is that chain or unset. Entries with an empty chain or address
    /// are skipped. Chain keys are lowercased; when two entries collapse onto
    /// the same key the first one (in map order) is kept.
    pub async fn aggregate_many(
        &self,
        addresses: &BTreeMap<String, String>,
        coin_ids: &[String],
        tokens: &[TokenSpec],
    ) -> BTreeMap<String, AggregationResult> {
        let mut requests: BTreeMap<String, String> = BTreeMap::new();
        for (chain, address) in addresses {
            let (chain, address) = (chain.trim().to_lowercase(), address.trim());
            if chain.is_empty() || address.is_empty() {
                continue;
            }
            match requests.entry(chain) {
                Entry::Vacant(slot) => {
                    slot.insert(address.to_string());
                }
                Entry::Occupied(slot) => {
                    warn!(chain = %slot.key(), ignored = address, "duplicate chain key in request");
                }
            }
        }

        let jobs = requests.into_iter().map(|(chain, address)| {
            let chain_tokens: Vec<TokenSpec> = tokens
                .iter()
                .filter(|t| match non_empty(t.chain.as_deref()) {
                    Some(token_chain) => token_chain.eq_ignore_ascii_case(&chain),
                    None => true,
                })
                .cloned()
                .collect();
            async move {
                let result = self
                    .aggregate(&chain, &address, coin_ids, &chain_tokens)
                    .await;
                (chain, result)
            }
        });

        join_all(jobs).await.into_iter().collect()
    }

    fn handle_for(&self, chain: &str) -> Result<ClientHandle, Unavailable> {
        match self.registry.resolve(chain) {
            Some(handle) => Ok(handle),
            None if self.registry.contains(chain) => Err(Unavailable::Rpc(format!(
                "could not create client for chain '{}'",
                chain
            ))),
            None => Err(Unavailable::NoEndpoint(chain.to_string())),
        }
    }

    async fn quotes_by_id(&self, ids: &[String]) -> HashMap<String, MarketQuote> {
        self.market
            .markets(ids)
            .await
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect()
    }

    async fn native_line(&self, chain: &str, address: &str) -> (BalanceLine, Option<String>) {
        if !self.registry.contains(chain) {
            let line = BalanceLine {
                coin_id: None,
                symbol: chain.to_uppercase(),
                name: chain.to_string(),
                contract: None,
                platform: None,
                chain: Some(chain.to_string()),
                balance: 0.0,
                usd_price: None,
                price_change_24h: None,
                usd_value: 0.0,
                logo: None,
            };
            return (
                line,
                Some(format!("native_balance_error: unknown chain '{}'", chain)),
            );
        }

        let coin_id = native_coin_for_chain(chain);
        let quote = async {
            let id = coin_id?;
            let quotes = self.market.markets(&[id.to_string()]).await;
            let position = quotes.iter().position(|q| q.id == id).unwrap_or(0);
            quotes.into_iter().nth(position)
        };
        let balance = async { self.handle_for(chain)?.fetch_native(address).await };
        let (quote, balance) = tokio::join!(quote, balance);

        let (balance, error) = match balance {
            Ok(balance) => (balance, None),
            Err(e) => (0.0, Some(format!("native_balance_error: {}", e))),
        };

        let symbol = quote
            .as_ref()
            .and_then(|q| non_empty(Some(q.symbol.as_str())))
            .map(str::to_uppercase)
            .or_else(|| native_ticker(chain).map(str::to_string))
            .unwrap_or_else(|| chain.to_uppercase());
        let name = quote
            .as_ref()
            .and_then(|q| non_empty(Some(q.name.as_str())))
            .unwrap_or(chain)
            .to_string();
        let usd_price = quote.as_ref().and_then(|q| q.current_price);

        let line = BalanceLine {
            coin_id: coin_id.map(str::to_string),
            symbol,
            name,
            contract: None,
            platform: None,
            chain: Some(chain.to_string()),
            balance,
            usd_price,
            price_change_24h: quote.as_ref().and_then(|q| q.price_change_percentage_24h),
            usd_value: usd_value(balance, usd_price),
            logo: quote.and_then(|q| q.image),
        };
        (line, error)
    }

    async fn coin_line(
        &self,
        coin_id: &str,
        quote: Option<&MarketQuote>,
        address: &str,
    ) -> (BalanceLine, Option<String>) {
        let symbol = quote
            .and_then(|q| non_empty(Some(q.symbol.as_str())))
            .unwrap_or(coin_id)
            .to_uppercase();
        let name = quote
            .and_then(|q| non_empty(Some(q.name.as_str())))
            .unwrap_or(coin_id)
            .to_string();
        let usd_price = quote.and_then(|q| q.current_price);

        let mut line = BalanceLine {
            coin_id: Some(coin_id.to_string()),
            symbol,
            name,
            contract: None,
            platform: None,
            chain: None,
            balance: 0.0,
            usd_price,
            price_change_24h: quote.and_then(|q| q.price_change_percentage_24h),
            usd_value: 0.0,
            logo: quote.and_then(|q| q.image.clone()),
        };

        // Without a contract the coin is listed at zero balance.
        let Some(found) = self.resolver.resolve(coin_id).await else {
            return (line, None);
        };

        let chain_key = chain_for_platform(&found.platform);
        let balance = match chain_key {
            Some(key) => match self.handle_for(key) {
                Ok(handle) => handle.fetch_token_balance(&found.contract, address).await,
                Err(e) => Err(e),
            },
            None => Err(Unavailable::NoEndpoint(found.platform.clone())),
        };

        let error = match balance {
            Ok(balance) => {
                line.balance = balance;
                None
            }
            Err(e) => Some(format!("token_balance_error: {}: {}", coin_id, e)),
        };
        line.usd_value = usd_value(line.balance, usd_price);
        line.contract = Some(found.contract);
        line.platform = Some(found.platform);
        line.chain = chain_key.map(str::to_string);
        (line, error)
    }

    /// `None` when the token has no contract address.
    async fn explicit_line(
        &self,
        token: &TokenSpec,
        chain: &str,
        address: &str,
    ) -> Option<(BalanceLine, Option<String>)> {
        let contract = non_empty(token.contract.as_deref())?;
        let token_chain = non_empty(token.chain.as_deref())
            .map(str::to_lowercase)
            .unwrap_or_else(|| chain.to_string());
        let platform = platform_for_chain(&token_chain);

        let balance = async {
            self.handle_for(&token_chain)?
                .fetch_token_balance(contract, address)
                .await
        };
        let info = async {
            match platform {
                Some(platform) => self.market.contract_info(platform, contract).await,
                None => None,
            }
        };
        let (balance, info) = tokio::join!(balance, info);
        let info = info.unwrap_or_default();

        let (balance, error) = match balance {
            Ok(balance) => (balance, None),
            Err(e) => (0.0, Some(format!("token_error: {}: {}", contract, e))),
        };

        let symbol = non_empty(info.symbol.as_deref())
            .or_else(|| non_empty(token.symbol.as_deref()))
            .map(str::to_uppercase)
            .unwrap_or_else(|| contract.chars().take(6).collect());
        let name = non_empty(info.name.as_deref())
            .or_else(|| non_empty(token.name.as_deref()))
            .unwrap_or(contract)
            .to_string();
        let usd_price = info.usd_price();

        let line = BalanceLine {
            coin_id: info.id.clone(),
            symbol,
            name,
            contract: Some(contract.to_string()),
            platform: platform.map(str::to_string),
            chain: Some(token_chain),
            balance,
            usd_price,
            price_change_24h: info.price_change_24h(),
            usd_value: usd_value(balance, usd_price),
            logo: info.logo(),
        };
        Some((line, error))
    }
}

/// Trimmed, non-empty coin ids in first-seen order, minus coins native to
/// `chain`.
fn dedupe_coin_ids(coin_ids: &[String], chain: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    coin_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .filter(|id| native_chain_of_coin(id) != Some(chain))
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

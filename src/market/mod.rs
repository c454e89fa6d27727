//! Off-chain market data: the provider client and the caches in front of it.

mod cache;
mod provider;

pub use cache::MarketDataCache;
pub use provider::{CoinGeckoClient, MarketDataProvider};

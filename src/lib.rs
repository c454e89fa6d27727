pub mod aggregator;
pub mod api;
mod chain;
pub mod chains;
pub mod config;
mod error;
mod evm;
pub mod market;
pub mod registry;
pub mod resolver;
#[cfg(feature = "solana")]
mod solana;
mod types;

pub use aggregator::AggregatorService;
pub use chain::{BalanceSource, ClientHandle, NullAdapter};
pub use config::{ChainEndpoint, EndpointMap, Settings};
pub use error::{ConfigError, ConnectError, Unavailable, UpstreamError};
pub use evm::EvmAdapter;
pub use market::{CoinGeckoClient, MarketDataCache, MarketDataProvider};
pub use registry::{ChainRegistry, Connector, RpcConnector};
pub use resolver::{ContractResolver, ResolvedContract};
#[cfg(feature = "solana")]
pub use solana::SolanaAdapter;
pub use types::{
    to_units, AggregationResult, BalanceLine, CoinDetail, ContractInfo, MarketQuote, TokenSpec,
};

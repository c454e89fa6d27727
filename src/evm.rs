use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::BlockNumberOrTag;
use alloy::sol;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::chain::{with_timeout, BalanceSource};
use crate::error::{ConnectError, Unavailable};
use crate::types::to_units;

/// Decimals of every EVM native currency.
const NATIVE_DECIMALS: u32 = 18;
/// Assumed when a token does not answer `decimals()`.
const DEFAULT_TOKEN_DECIMALS: u8 = 18;

// ERC-20 ABI subset
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

/// EVM chain adapter using JSON-RPC.
pub struct EvmAdapter {
    chain_key: String,
    provider: RootProvider<Http<Client>>,
    timeout: Duration,
}

impl EvmAdapter {
    pub fn connect(chain_key: &str, rpc_url: &str, timeout: Duration) -> Result<Self, ConnectError> {
        let url = reqwest::Url::parse(rpc_url).map_err(|e| ConnectError::MalformedUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            chain_key: chain_key.to_string(),
            provider,
            timeout,
        })
    }

    fn parse_address(address: &str) -> Result<Address, Unavailable> {
        address
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| Unavailable::InvalidAddress(address.to_string()))
    }

    async fn token_decimals(&self, token: Address) -> u8 {
        let contract = IERC20::new(token, self.provider.clone());
        match with_timeout(self.timeout, contract.decimals().call()).await {
            Ok(ret) => ret._0,
            Err(e) => {
                debug!(chain = %self.chain_key, %token, "decimals() failed, assuming 18: {}", e);
                DEFAULT_TOKEN_DECIMALS
            }
        }
    }
}

#[async_trait]
impl BalanceSource for EvmAdapter {
    fn chain_key(&self) -> &str {
        &self.chain_key
    }

    async fn fetch_native(&self, address: &str) -> Result<f64, Unavailable> {
        let addr = Self::parse_address(address)?;
        let call = self
            .provider
            .get_balance(addr)
            .block_id(BlockNumberOrTag::Latest.into());

        let wei: U256 = with_timeout(self.timeout, call).await.inspect_err(|e| {
            warn!(chain = %self.chain_key, address, "native balance error: {}", e);
        })?;

        to_units(wei, NATIVE_DECIMALS).ok_or(Unavailable::Decimals(NATIVE_DECIMALS))
    }

    async fn fetch_token_balance(
        &self,
        contract: &str,
        address: &str,
    ) -> Result<f64, Unavailable> {
        let token = Self::parse_address(contract)?;
        let owner = Self::parse_address(address)?;

        let decimals = self.token_decimals(token).await;
        let erc20 = IERC20::new(token, self.provider.clone());
        let raw = with_timeout(self.timeout, erc20.balanceOf(owner).call())
            .await
            .inspect_err(|e| {
                warn!(chain = %self.chain_key, contract, address, "erc20 balance error: {}", e);
            })?
            ._0;

        to_units(raw, u32::from(decimals)).ok_or(Unavailable::Decimals(u32::from(decimals)))
    }
}

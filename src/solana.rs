use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use solana_account_decoder::UiAccountData;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_client::rpc_response::RpcKeyedAccount;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::chain::{with_timeout, BalanceSource};
use crate::error::{ConnectError, Unavailable};
use crate::types::to_units;

/// SOL has 9 decimals (lamports).
const LAMPORT_DECIMALS: u32 = 9;

/// Solana chain adapter using JSON-RPC
pub struct SolanaAdapter {
    chain_key: String,
    client: Arc<RpcClient>,
    timeout: Duration,
}

impl SolanaAdapter {
    pub fn connect(chain_key: &str, rpc_url: &str, timeout: Duration) -> Result<Self, ConnectError> {
        reqwest::Url::parse(rpc_url).map_err(|e| ConnectError::MalformedUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            chain_key: chain_key.to_string(),
            client: Arc::new(RpcClient::new_with_timeout(rpc_url.to_string(), timeout)),
            timeout,
        })
    }

    fn parse_pubkey(value: &str) -> Result<Pubkey, Unavailable> {
        Pubkey::from_str(value.trim()).map_err(|_| Unavailable::InvalidAddress(value.to_string()))
    }

    async fn mint_decimals(&self, mint: &Pubkey) -> Option<u8> {
        let data = with_timeout(self.timeout, self.client.get_account_data(mint))
            .await
            .ok()?;
        spl_token::state::Mint::unpack(&data)
            .map(|state| state.decimals)
            .inspect_err(|e| debug!(%mint, "mint account did not unpack: {}", e))
            .ok()
    }
}

/// Raw amount and (when the RPC returned parsed data) decimals of a token
/// account.
fn token_account_amount(account: &RpcKeyedAccount) -> Option<(u64, Option<u8>)> {
    match &account.account.data {
        UiAccountData::Binary(encoded, _) | UiAccountData::LegacyBinary(encoded) => {
            use base64::Engine;
            let engine = base64::engine::general_purpose::STANDARD;
            let decoded = engine.decode(encoded).ok()?;
            let state = spl_token::state::Account::unpack(&decoded).ok()?;
            Some((state.amount, None))
        }
        UiAccountData::Json(parsed) => {
            let token_amount = parsed.parsed.get("info")?.get("tokenAmount")?;
            let amount = token_amount.get("amount")?.as_str()?.parse::<u64>().ok()?;
            let decimals = token_amount
                .get("decimals")
                .and_then(|d| d.as_u64())
                .and_then(|d| u8::try_from(d).ok());
            Some((amount, decimals))
        }
    }
}

#[async_trait]
impl BalanceSource for SolanaAdapter {
    fn chain_key(&self) -> &str {
        &self.chain_key
    }

    async fn fetch_native(&self, address: &str) -> Result<f64, Unavailable> {
        let pubkey = Self::parse_pubkey(address)?;
        let lamports = with_timeout(self.timeout, self.client.get_balance(&pubkey))
            .await
            .inspect_err(|e| warn!(address, "solana balance error: {}", e))?;

        to_units(U256::from(lamports), LAMPORT_DECIMALS)
            .ok_or(Unavailable::Decimals(LAMPORT_DECIMALS))
    }

    async fn fetch_token_balance(
        &self,
        contract: &str,
        address: &str,
    ) -> Result<f64, Unavailable> {
        let owner = Self::parse_pubkey(address)?;
        let mint = Self::parse_pubkey(contract)?;

        let accounts = with_timeout(
            self.timeout,
            self.client
                .get_token_accounts_by_owner(&owner, TokenAccountsFilter::Mint(mint)),
        )
        .await
        .inspect_err(|e| warn!(address, mint = contract, "spl token balance error: {}", e))?;

        // Sum up balances from all token accounts
        let mut total: u64 = 0;
        let mut parsed_decimals = None;
        for (amount, decimals) in accounts.iter().filter_map(token_account_amount) {
            total = total.saturating_add(amount);
            parsed_decimals = parsed_decimals.or(decimals);
        }
        if total == 0 {
            return Ok(0.0);
        }

        let decimals = match self.mint_decimals(&mint).await.or(parsed_decimals) {
            Some(decimals) => u32::from(decimals),
            None => {
                return Err(Unavailable::Rpc(format!(
                    "could not read decimals of mint {}",
                    mint
                )))
            }
        };
        to_units(U256::from(total), decimals).ok_or(Unavailable::Decimals(decimals))
    }
}

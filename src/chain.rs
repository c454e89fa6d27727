use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Unavailable;

/// Balance capability every chain adapter provides.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Chain key this source is bound to.
    fn chain_key(&self) -> &str;

    /// Balance of the chain's base currency, in whole units.
    async fn fetch_native(&self, address: &str) -> Result<f64, Unavailable>;

    /// Balance of a token contract (or mint) held by `address`, in whole units.
    async fn fetch_token_balance(&self, contract: &str, address: &str)
        -> Result<f64, Unavailable>;
}

/// Connected client for one chain endpoint, shared between requests.
pub type ClientHandle = Arc<dyn BalanceSource>;

/// Source that never has a balance, used when a chain family is not
/// compiled in.
pub struct NullAdapter {
    chain_key: String,
    reason: String,
}

impl NullAdapter {
    pub fn new(chain_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            chain_key: chain_key.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BalanceSource for NullAdapter {
    fn chain_key(&self) -> &str {
        &self.chain_key
    }

    async fn fetch_native(&self, _address: &str) -> Result<f64, Unavailable> {
        Err(Unavailable::Disabled(self.reason.clone()))
    }

    async fn fetch_token_balance(
        &self,
        _contract: &str,
        _address: &str,
    ) -> Result<f64, Unavailable> {
        Err(Unavailable::Disabled(self.reason.clone()))
    }
}

/// Run an RPC future under `limit`, flattening timeout and call errors
/// into [`Unavailable`].
pub(crate) async fn with_timeout<T, E, F>(limit: Duration, call: F) -> Result<T, Unavailable>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Unavailable::Rpc(e.to_string())),
        Err(_) => Err(Unavailable::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_adapter_is_unavailable() {
        let adapter = NullAdapter::new("solana", "solana");
        assert_eq!(adapter.chain_key(), "solana");
        assert_eq!(
            adapter.fetch_native("abc").await,
            Err(Unavailable::Disabled("solana".to_string()))
        );
        assert!(adapter.fetch_token_balance("mint", "abc").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let limit = Duration::from_secs(20);
        let result: Result<(), Unavailable> = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, std::io::Error>(())
        })
        .await;
        assert_eq!(result, Err(Unavailable::Timeout(limit)));
    }
}

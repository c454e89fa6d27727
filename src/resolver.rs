use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::chains::PREFERRED_PLATFORMS;
use crate::market::MarketDataCache;

/// Contract address of a coin on one market platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedContract {
    pub contract: String,
    pub platform: String,
}

/// Maps market coin ids to an on-chain contract.
pub struct ContractResolver {
    market: Arc<MarketDataCache>,
}

impl ContractResolver {
    pub fn new(market: Arc<MarketDataCache>) -> Self {
        Self { market }
    }

    pub async fn resolve(&self, coin_id: &str) -> Option<ResolvedContract> {
        let detail = self.market.coin_detail(coin_id).await?;
        select_contract(&detail.platforms)
    }
}

/// Pick a contract from a platform map: the first preferred platform with
/// an address, else the smallest remaining platform key.
pub fn select_contract(platforms: &BTreeMap<String, Option<String>>) -> Option<ResolvedContract> {
    let preferred: Option<(&str, &str)> = PREFERRED_PLATFORMS
        .iter()
        .copied()
        .find_map(|p| address_on(platforms, p).map(|a| (p, a)));

    // BTreeMap iterates in key order, which makes the fallback stable.
    let (platform, contract) = preferred.or_else(|| {
        platforms
            .keys()
            .filter(|p| !p.trim().is_empty())
            .find_map(|p| address_on(platforms, p.as_str()).map(|a| (p.as_str(), a)))
    })?;

    Some(ResolvedContract {
        contract: contract.to_string(),
        platform: platform.to_string(),
    })
}

fn address_on<'a>(platforms: &'a BTreeMap<String, Option<String>>, platform: &str) -> Option<&'a str> {
    platforms
        .get(platform)
        .and_then(|a| a.as_deref())
        .map(str::trim)
        .filter(|a| !a.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platforms(entries: &[(&str, Option<&str>)]) -> BTreeMap<String, Option<String>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_ethereum_is_preferred() {
        let map = platforms(&[
            ("polygon-pos", Some("0x2791")),
            ("ethereum", Some("0xa0b8")),
        ]);
        assert_eq!(
            select_contract(&map),
            Some(ResolvedContract {
                contract: "0xa0b8".to_string(),
                platform: "ethereum".to_string(),
            })
        );
    }

    #[test]
    fn test_preference_order_skips_empty_addresses() {
        let map = platforms(&[
            ("ethereum", Some("")),
            ("binance-smart-chain", None),
            ("avalanche", Some("0xb97e")),
            ("polygon-pos", Some("0x2791")),
        ]);
        assert_eq!(select_contract(&map).unwrap().platform, "polygon-pos");
    }

    #[test]
    fn test_fallback_is_sorted_by_platform() {
        let map = platforms(&[
            ("tron", Some("TXYZ")),
            ("solana", Some("EPjF")),
            ("", Some("ignored")),
        ]);
        let found = select_contract(&map).unwrap();
        assert_eq!(found.platform, "solana");
        assert_eq!(found.contract, "EPjF");
    }

    #[test]
    fn test_native_coin_has_no_contract() {
        assert_eq!(select_contract(&platforms(&[("", Some(""))])), None);
        assert_eq!(select_contract(&BTreeMap::new()), None);
    }
}

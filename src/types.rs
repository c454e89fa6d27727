use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Price and metadata for one coin, as listed by the market provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketQuote {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Coin detail record; only the cross-chain contract map is used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CoinDetail {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    /// Platform key -> contract address. The provider uses `""` keys and
    /// `null`/empty addresses for coins without a contract.
    #[serde(default)]
    pub platforms: BTreeMap<String, Option<String>>,
}

/// Token record looked up by platform and contract address.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<ImageLinks>,
    #[serde(default)]
    pub market_data: Option<ContractMarketData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageLinks {
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractMarketData {
    #[serde(default)]
    pub current_price: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

impl ContractInfo {
    pub fn usd_price(&self) -> Option<f64> {
        self.market_data
            .as_ref()
            .and_then(|m| m.current_price.get("usd").copied().flatten())
    }

    pub fn price_change_24h(&self) -> Option<f64> {
        self.market_data
            .as_ref()
            .and_then(|m| m.price_change_percentage_24h)
    }

    pub fn logo(&self) -> Option<String> {
        self.image.as_ref().and_then(|i| i.small.clone())
    }
}

/// Explicit token requested by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenSpec {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One valued entry of a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceLine {
    pub coin_id: Option<String>,
    pub symbol: String,
    pub name: String,
    pub contract: Option<String>,
    pub platform: Option<String>,
    pub chain: Option<String>,
    pub balance: f64,
    pub usd_price: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub usd_value: f64,
    pub logo: Option<String>,
}

/// Valuation of one address on one chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationResult {
    pub chain: String,
    pub address: String,
    pub native: Option<BalanceLine>,
    pub tokens: Vec<BalanceLine>,
    pub errors: Vec<String>,
    pub total_usd: f64,
}

impl AggregationResult {
    pub fn new(chain: &str, address: &str) -> Self {
        Self {
            chain: chain.to_string(),
            address: address.to_string(),
            native: None,
            tokens: Vec::new(),
            errors: Vec::new(),
            total_usd: 0.0,
        }
    }

    /// Sum of the native and token values; non-finite values count as zero.
    pub fn compute_total(&self) -> f64 {
        self.native
            .iter()
            .chain(self.tokens.iter())
            .map(|line| finite_or_zero(line.usd_value))
            .sum()
    }
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// `balance * price`, zero when either side is missing or not finite.
pub(crate) fn usd_value(balance: f64, price: Option<f64>) -> f64 {
    finite_or_zero(finite_or_zero(balance) * finite_or_zero(price.unwrap_or(0.0)))
}

/// Convert a raw integer amount into whole units, `raw / 10^decimals`.
///
/// Returns `None` when `10^decimals` does not fit in 256 bits.
pub fn to_units(raw: U256, decimals: u32) -> Option<f64> {
    let divisor = U256::from(10u64).checked_pow(U256::from(decimals))?;
    let whole = raw / divisor;
    let fractional = raw % divisor;

    let formatted = if fractional.is_zero() {
        whole.to_string()
    } else {
        let digits = fractional.to_string();
        let padded = format!("{}{}", "0".repeat(decimals as usize - digits.len()), digits);
        format!("{}.{}", whole, padded.trim_end_matches('0'))
    };
    formatted.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(usd_value: f64) -> BalanceLine {
        BalanceLine {
            coin_id: None,
            symbol: "X".to_string(),
            name: "X".to_string(),
            contract: None,
            platform: None,
            chain: None,
            balance: 0.0,
            usd_price: None,
            price_change_24h: None,
            usd_value,
            logo: None,
        }
    }

    #[test]
    fn test_to_units() {
        let wei = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(to_units(wei, 18), Some(1.5));
        assert_eq!(to_units(U256::from(100_000_000u64), 6), Some(100.0));
        assert_eq!(to_units(U256::from(1u64), 9), Some(0.000000001));
        assert_eq!(to_units(U256::ZERO, 18), Some(0.0));
        assert_eq!(to_units(U256::from(1u64), 100), None);
    }

    #[test]
    fn test_total_ignores_non_finite() {
        let mut result = AggregationResult::new("ethereum", "0xabc");
        result.native = Some(line(10.0));
        result.tokens.push(line(f64::NAN));
        result.tokens.push(line(2.5));
        result.tokens.push(line(f64::INFINITY));
        assert_eq!(result.compute_total(), 12.5);
    }

    #[test]
    fn test_usd_value_missing_price() {
        assert_eq!(usd_value(3.0, None), 0.0);
        assert_eq!(usd_value(3.0, Some(2.0)), 6.0);
    }

    #[test]
    fn test_contract_info_parsing() {
        let info: ContractInfo = serde_json::from_value(serde_json::json!({
            "id": "usd-coin",
            "symbol": "usdc",
            "name": "USDC",
            "image": {"small": "https://img/usdc-small.png"},
            "market_data": {
                "current_price": {"usd": 1.001, "eur": null},
                "price_change_percentage_24h": -0.02
            }
        }))
        .unwrap();
        assert_eq!(info.usd_price(), Some(1.001));
        assert_eq!(info.price_change_24h(), Some(-0.02));
        assert_eq!(info.logo().as_deref(), Some("https://img/usdc-small.png"));
    }

    #[test]
    fn test_coin_detail_null_platforms() {
        let detail: CoinDetail = serde_json::from_value(serde_json::json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "platforms": {"": null}
        }))
        .unwrap();
        assert_eq!(detail.platforms.get(""), Some(&None));
    }
}

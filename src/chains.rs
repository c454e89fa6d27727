//! Static chain tables: default endpoints, market platform keys and the
//! native coin of each chain.

use serde::Serialize;

/// Family of chains sharing an RPC interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl ChainFamily {
    pub fn of(chain_key: &str) -> Self {
        if chain_key == SOLANA {
            ChainFamily::Solana
        } else {
            ChainFamily::Evm
        }
    }
}

pub const SOLANA: &str = "solana";

/// Compiled-in endpoints: (chain key, env override variable, default URL).
pub const DEFAULT_ENDPOINTS: &[(&str, &str, &str)] = &[
    ("ethereum", "RPC_ETH", "https://cloudflare-eth.com"),
    ("bsc", "RPC_BSC", "https://bsc-dataseed.binance.org/"),
    ("polygon", "RPC_POLYGON", "https://rpc.ankr.com/polygon"),
    ("avax", "RPC_AVAX", "https://rpc.ankr.com/avalanche"),
    ("arbitrum", "RPC_ARBI", "https://rpc.ankr.com/arbitrum"),
    ("optimism", "RPC_OPT", "https://rpc.ankr.com/optimism"),
    ("fantom", "RPC_FANTOM", "https://rpc.ankr.com/fantom"),
    ("cronos", "RPC_CRONOS", "https://evm.cronos.org"),
    ("solana", "RPC_SOLANA", "https://api.mainnet-beta.solana.com"),
];

/// Market platform key -> chain key.
const PLATFORMS: &[(&str, &str)] = &[
    ("ethereum", "ethereum"),
    ("binance-smart-chain", "bsc"),
    ("polygon-pos", "polygon"),
    ("avalanche", "avax"),
    ("arbitrum-one", "arbitrum"),
    ("optimistic-ethereum", "optimism"),
    ("fantom", "fantom"),
    ("cronos", "cronos"),
    ("solana", "solana"),
];

/// Native coin market id -> (chain key, ticker).
const NATIVE_COINS: &[(&str, &str, &str)] = &[
    ("ethereum", "ethereum", "ETH"),
    ("binancecoin", "bsc", "BNB"),
    ("polygon", "polygon", "MATIC"),
    ("avalanche-2", "avax", "AVAX"),
    ("arbitrum", "arbitrum", "ARB"),
    ("optimism", "optimism", "OP"),
    ("fantom", "fantom", "FTM"),
    ("crypto-com-chain", "cronos", "CRO"),
    ("solana", "solana", "SOL"),
];

/// Platforms tried in order when picking a token contract.
pub const PREFERRED_PLATFORMS: &[&str] = &[
    "ethereum",
    "binance-smart-chain",
    "polygon-pos",
    "avalanche",
    "arbitrum-one",
    "optimistic-ethereum",
];

pub fn chain_for_platform(platform: &str) -> Option<&'static str> {
    PLATFORMS
        .iter()
        .find(|(p, _)| *p == platform)
        .map(|(_, chain)| *chain)
}

pub fn platform_for_chain(chain_key: &str) -> Option<&'static str> {
    PLATFORMS
        .iter()
        .find(|(_, c)| *c == chain_key)
        .map(|(platform, _)| *platform)
}

/// Market id of the coin paying gas on `chain_key`.
pub fn native_coin_for_chain(chain_key: &str) -> Option<&'static str> {
    NATIVE_COINS
        .iter()
        .find(|(_, c, _)| *c == chain_key)
        .map(|(id, _, _)| *id)
}

pub fn native_ticker(chain_key: &str) -> Option<&'static str> {
    NATIVE_COINS
        .iter()
        .find(|(_, c, _)| *c == chain_key)
        .map(|(_, _, ticker)| *ticker)
}

/// Chain on which `coin` is the native currency. Accepts market ids as well
/// as tickers ("eth", "sol", ...), case-insensitively.
pub fn native_chain_of_coin(coin: &str) -> Option<&'static str> {
    let coin = coin.trim();
    NATIVE_COINS
        .iter()
        .find(|(id, _, ticker)| id.eq_ignore_ascii_case(coin) || ticker.eq_ignore_ascii_case(coin))
        .map(|(_, chain, _)| *chain)
        .or_else(|| match coin.to_ascii_lowercase().as_str() {
            "matic-network" | "pol" => Some("polygon"),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip() {
        assert_eq!(chain_for_platform("binance-smart-chain"), Some("bsc"));
        assert_eq!(platform_for_chain("bsc"), Some("binance-smart-chain"));
        assert_eq!(chain_for_platform("tron"), None);
    }

    #[test]
    fn test_native_coin_aliases() {
        assert_eq!(native_chain_of_coin("ethereum"), Some("ethereum"));
        assert_eq!(native_chain_of_coin("eth"), Some("ethereum"));
        assert_eq!(native_chain_of_coin("SOL"), Some("solana"));
        assert_eq!(native_chain_of_coin("avalanche-2"), Some("avax"));
        assert_eq!(native_chain_of_coin("usd-coin"), None);
    }

    #[test]
    fn test_native_coin_for_chain() {
        assert_eq!(native_coin_for_chain("bsc"), Some("binancecoin"));
        assert_eq!(native_ticker("cronos"), Some("CRO"));
        assert_eq!(native_coin_for_chain("unknown"), None);
    }

    #[test]
    fn test_family() {
        assert_eq!(ChainFamily::of("solana"), ChainFamily::Solana);
        assert_eq!(ChainFamily::of("polygon"), ChainFamily::Evm);
    }
}

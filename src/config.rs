use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::chains::DEFAULT_ENDPOINTS;
use crate::error::ConfigError;

/// Env variable holding a JSON object of endpoint overrides.
pub const CHAIN_CONFIG_JSON_VAR: &str = "CHAIN_CONFIG_JSON";

/// Files looked up in the working directory when no path is configured.
const DEFAULT_CONFIG_FILES: &[&str] = &["chains.yaml", "chains.json"];

/// Chain key -> RPC URL.
pub type EndpointMap = BTreeMap<String, String>;

/// One chain key bound to its RPC URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEndpoint {
    pub key: String,
    pub rpc_url: String,
}

/// Service settings, read from the environment and overridable on the
/// command line.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Market data API base URL
    #[arg(long, env = "COINGECKO_API", default_value = "https://api.coingecko.com/api/v3")]
    pub coingecko_api: String,

    /// Optional CoinGecko demo API key
    #[arg(long, env = "COINGECKO_API_KEY")]
    pub coingecko_api_key: Option<String>,

    /// Chain endpoint file (JSON or YAML)
    #[arg(long, env = "CHAIN_CONFIG_PATH")]
    pub chain_config_path: Option<PathBuf>,

    /// Timeout for RPC calls, in seconds
    #[arg(long, env = "RPC_TIMEOUT_SECS", default_value_t = 20)]
    pub rpc_timeout_secs: u64,

    /// Timeout for market listing and coin detail calls, in seconds
    #[arg(long, env = "MARKET_TIMEOUT_SECS", default_value_t = 12)]
    pub market_timeout_secs: u64,

    /// Timeout for search and contract lookups, in seconds
    #[arg(long, env = "LOOKUP_TIMEOUT_SECS", default_value_t = 10)]
    pub lookup_timeout_secs: u64,

    /// How long market listings stay cached, in seconds
    #[arg(long, env = "MARKETS_TTL_SECS", default_value_t = 12)]
    pub markets_ttl_secs: u64,

    /// How long coin details stay cached, in seconds
    #[arg(long, env = "COIN_DETAIL_TTL_SECS", default_value_t = 60)]
    pub coin_detail_ttl_secs: u64,

    /// Minimum seconds between checks of the chain config sources
    #[arg(long, env = "CHAIN_REFRESH_SECS", default_value_t = 5)]
    pub chain_refresh_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coingecko_api: "https://api.coingecko.com/api/v3".to_string(),
            coingecko_api_key: None,
            chain_config_path: None,
            rpc_timeout_secs: 20,
            market_timeout_secs: 12,
            lookup_timeout_secs: 10,
            markets_ttl_secs: 12,
            coin_detail_ttl_secs: 60,
            chain_refresh_secs: 5,
        }
    }
}

impl Settings {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn market_timeout(&self) -> Duration {
        Duration::from_secs(self.market_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn markets_ttl(&self) -> Duration {
        Duration::from_secs(self.markets_ttl_secs)
    }

    pub fn coin_detail_ttl(&self) -> Duration {
        Duration::from_secs(self.coin_detail_ttl_secs)
    }

    pub fn chain_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.chain_refresh_secs)
    }

    /// Explicit config path, else the first default file present in the
    /// working directory.
    pub fn resolve_chain_config_path(&self) -> Option<PathBuf> {
        self.chain_config_path.clone().or_else(|| {
            DEFAULT_CONFIG_FILES
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
        })
    }
}

/// An endpoint is either a bare URL or an object with an `rpc` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EndpointEntry {
    Url(String),
    Detailed { rpc: String },
}

impl EndpointEntry {
    fn into_url(self) -> String {
        match self {
            EndpointEntry::Url(url) | EndpointEntry::Detailed { rpc: url } => url,
        }
    }
}

/// Compiled-in endpoints, each overridable by its own env variable.
pub fn default_endpoints() -> EndpointMap {
    DEFAULT_ENDPOINTS
        .iter()
        .map(|(key, var, default)| {
            let url = std::env::var(var).unwrap_or_else(|_| (*default).to_string());
            ((*key).to_string(), url)
        })
        .collect()
}

pub fn parse_endpoints_json(raw: &str) -> Result<EndpointMap, ConfigError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(ConfigError::NotAnObject);
    }
    let entries: BTreeMap<String, EndpointEntry> = serde_json::from_value(value)?;
    validate(entries)
}

pub fn parse_endpoints_yaml(raw: &str) -> Result<EndpointMap, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
    if !value.is_mapping() {
        return Err(ConfigError::NotAnObject);
    }
    let entries: BTreeMap<String, EndpointEntry> = serde_yaml::from_value(value)?;
    validate(entries)
}

/// Load an endpoint file. `.json` files are parsed as JSON, `.yaml`/`.yml`
/// as YAML; anything else is tried as JSON first.
pub fn load_endpoints_file(path: &Path) -> Result<EndpointMap, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_endpoints_json(&raw),
        Some("yaml") | Some("yml") => parse_endpoints_yaml(&raw),
        _ => parse_endpoints_json(&raw).or_else(|_| parse_endpoints_yaml(&raw)),
    }
}

fn validate(entries: BTreeMap<String, EndpointEntry>) -> Result<EndpointMap, ConfigError> {
    entries
        .into_iter()
        .map(|(key, entry)| {
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                return Err(ConfigError::EmptyKey);
            }
            let url = entry.into_url().trim().to_string();
            check_url(&key, &url)?;
            Ok((key, url))
        })
        .collect()
}

fn check_url(chain: &str, url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidEndpoint {
        chain: chain.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidEndpoint {
            chain: chain.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults_cover_known_chains() {
        let endpoints = default_endpoints();
        assert!(endpoints.contains_key("ethereum"));
        assert!(endpoints.contains_key("bsc"));
        assert!(endpoints.contains_key("solana"));
    }

    #[test]
    fn test_json_accepts_both_entry_shapes() {
        let map = assert_ok!(parse_endpoints_json(
            r#"{"ethereum": "https://eth.example", "Base": {"rpc": "https://base.example", "name": "Base"}}"#
        ));
        assert_eq!(map["ethereum"], "https://eth.example");
        assert_eq!(map["base"], "https://base.example");
    }

    #[test]
    fn test_yaml_config() {
        let map = assert_ok!(parse_endpoints_yaml(
            "ethereum: https://eth.example\npolygon:\n  rpc: https://polygon.example\n"
        ));
        assert_eq!(map.len(), 2);
        assert_eq!(map["polygon"], "https://polygon.example");
    }

    #[test]
    fn test_malformed_entries_reject_the_whole_source() {
        assert!(matches!(
            parse_endpoints_json(r#"{"ethereum": "https://eth.example", "bsc": 42}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            parse_endpoints_json(r#"{"bsc": "not a url"}"#),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            parse_endpoints_json(r#"{"bsc": "ftp://rpc.example"}"#),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            parse_endpoints_json(r#"{" ": "https://rpc.example"}"#),
            Err(ConfigError::EmptyKey)
        ));
        assert!(matches!(
            parse_endpoints_json(r#"["https://rpc.example"]"#),
            Err(ConfigError::NotAnObject)
        ));
    }

    #[test]
    fn test_load_file_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();

        let yaml = dir.path().join("chains.yaml");
        std::fs::write(&yaml, "fantom: https://ftm.example\n").unwrap();
        assert_eq!(
            load_endpoints_file(&yaml).unwrap()["fantom"],
            "https://ftm.example"
        );

        let mut unknown = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        write!(unknown, r#"{{"cronos": "https://cro.example"}}"#).unwrap();
        assert_eq!(
            load_endpoints_file(unknown.path()).unwrap()["cronos"],
            "https://cro.example"
        );

        assert_err!(load_endpoints_file(&dir.path().join("missing.json")));
    }

    #[test]
    fn test_explicit_path_wins() {
        let settings = Settings {
            chain_config_path: Some(PathBuf::from("/etc/chains.json")),
            ..Settings::default()
        };
        assert_eq!(
            settings.resolve_chain_config_path(),
            Some(PathBuf::from("/etc/chains.json"))
        );
        assert_eq!(settings.rpc_timeout(), Duration::from_secs(20));
    }
}

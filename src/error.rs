use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Chain endpoint configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON chain config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML chain config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("chain config must be an object of chain key to endpoint")]
    NotAnObject,

    #[error("empty chain key in config")]
    EmptyKey,

    #[error("invalid rpc url for chain '{chain}': {reason}")]
    InvalidEndpoint { chain: String, reason: String },
}

/// A balance could not be read. The aggregator turns this into a zero
/// balance plus an entry in the result's `errors`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Unavailable {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("rpc call failed: {0}")]
    Rpc(String),

    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),

    #[error("no rpc endpoint for chain '{0}'")]
    NoEndpoint(String),

    #[error("{0} support is not enabled")]
    Disabled(String),

    #[error("token decimals {0} out of range")]
    Decimals(u32),
}

/// The market-data provider failed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("unexpected provider response: {0}")]
    Decode(String),

    #[error("invalid provider base url '{url}': {reason}")]
    BaseUrl { url: String, reason: String },
}

/// A client handle could not be created for an endpoint.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("malformed rpc url '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("client setup failed: {0}")]
    Setup(String),
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::chain::ClientHandle;
use crate::chains::ChainFamily;
use crate::config::{
    load_endpoints_file, parse_endpoints_json, ChainEndpoint, EndpointMap, CHAIN_CONFIG_JSON_VAR,
};
use crate::error::ConnectError;
use crate::evm::EvmAdapter;

/// Creates a client handle for an endpoint.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &ChainEndpoint) -> Result<ClientHandle, ConnectError>;
}

/// Connects EVM keys through alloy and the `solana` key through the Solana
/// RPC client (or a [`NullAdapter`](crate::chain::NullAdapter) when built
/// without the `solana` feature).
pub struct RpcConnector {
    timeout: Duration,
}

impl RpcConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for RpcConnector {
    fn connect(&self, endpoint: &ChainEndpoint) -> Result<ClientHandle, ConnectError> {
        match ChainFamily::of(&endpoint.key) {
            ChainFamily::Evm => Ok(Arc::new(EvmAdapter::connect(
                &endpoint.key,
                &endpoint.rpc_url,
                self.timeout,
            )?)),
            #[cfg(feature = "solana")]
            ChainFamily::Solana => Ok(Arc::new(crate::solana::SolanaAdapter::connect(
                &endpoint.key,
                &endpoint.rpc_url,
                self.timeout,
            )?)),
            #[cfg(not(feature = "solana"))]
            ChainFamily::Solana => Ok(Arc::new(crate::chain::NullAdapter::new(
                &endpoint.key,
                "solana",
            ))),
        }
    }
}

/// How long `refresh` trusts its last look at the env variable and file.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Overrides {
    checked_at: Option<Instant>,
    env_raw: Option<String>,
    env: EndpointMap,
    file_mtime: Option<SystemTime>,
    file: EndpointMap,
}

/// Chain key -> RPC endpoint map with lazily connected, cached handles.
///
/// Endpoints come from the compiled-in defaults, then the env override JSON,
/// then the config file; later sources win. Keys are never dropped by a
/// reload. The endpoint map is swapped as a whole, never edited in place.
/// Sources are looked at again at most once per refresh interval.
pub struct ChainRegistry {
    endpoints: RwLock<Arc<EndpointMap>>,
    overrides: Mutex<Overrides>,
    refresh_interval: Duration,
    config_path: Option<PathBuf>,
    env_var: Option<String>,
    connector: Box<dyn Connector>,
    handles: RwLock<HashMap<String, (String, ClientHandle)>>,
}

impl ChainRegistry {
    pub fn new(base: EndpointMap, connector: Box<dyn Connector>) -> Self {
        Self {
            endpoints: RwLock::new(Arc::new(base)),
            overrides: Mutex::new(Overrides::default()),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            config_path: None,
            env_var: None,
            connector,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Watch `path` for endpoint overrides.
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Read endpoint overrides from the JSON held in env variable `var`.
    pub fn with_env_overrides(mut self, var: &str) -> Self {
        self.env_var = Some(var.to_string());
        self
    }

    /// Minimum time between two looks at the override sources.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Registry wired to the process environment.
    pub fn from_env(
        base: EndpointMap,
        config_path: Option<PathBuf>,
        rpc_timeout: Duration,
        refresh_interval: Duration,
    ) -> Self {
        Self::new(base, Box::new(RpcConnector::new(rpc_timeout)))
            .with_config_file(config_path)
            .with_env_overrides(CHAIN_CONFIG_JSON_VAR)
            .with_refresh_interval(refresh_interval)
    }

    /// Current endpoint snapshot.
    pub fn endpoints(&self) -> Arc<EndpointMap> {
        self.refresh();
        self.endpoints.read().clone()
    }

    pub fn contains(&self, chain_key: &str) -> bool {
        self.endpoints().contains_key(chain_key)
    }

    /// Connected handle for `chain_key`, or `None` when the key is unknown
    /// or the client could not be created. Failures are not remembered.
    pub fn resolve(&self, chain_key: &str) -> Option<ClientHandle> {
        let rpc_url = self.endpoints().get(chain_key)?.clone();

        if let Some((cached_url, handle)) = self.handles.read().get(chain_key) {
            if *cached_url == rpc_url {
                return Some(handle.clone());
            }
        }

        let endpoint = ChainEndpoint {
            key: chain_key.to_string(),
            rpc_url,
        };
        match self.connector.connect(&endpoint) {
            Ok(handle) => {
                self.handles.write().insert(
                    endpoint.key.clone(),
                    (endpoint.rpc_url.clone(), handle.clone()),
                );
                Some(handle)
            }
            Err(e) => {
                warn!(chain = chain_key, url = %endpoint.rpc_url, "failed to create client: {}", e);
                None
            }
        }
    }

    /// Re-read the env overrides and, if its modification time changed, the
    /// config file. Invalid sources are logged and the previous map kept.
    /// A no-op until the refresh interval has passed since the last look.
    pub fn refresh(&self) {
        let mut overrides = self.overrides.lock();
        if overrides
            .checked_at
            .is_some_and(|at| at.elapsed() < self.refresh_interval)
        {
            return;
        }
        overrides.checked_at = Some(Instant::now());
        let mut changed = false;

        if let Some(var) = &self.env_var {
            let raw = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
            if raw != overrides.env_raw {
                match raw.as_deref().map(parse_endpoints_json).transpose() {
                    Ok(map) => {
                        overrides.env = map.unwrap_or_default();
                        changed = true;
                    }
                    Err(e) => warn!("ignoring {}: {}", var, e),
                }
                overrides.env_raw = raw;
            }
        }

        if let Some(path) = &self.config_path {
            let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
            if mtime.is_some() && mtime != overrides.file_mtime {
                match load_endpoints_file(path) {
                    Ok(map) => {
                        info!("loaded {} chains from {}", map.len(), path.display());
                        overrides.file = map;
                        changed = true;
                    }
                    Err(e) => warn!("ignoring chain config {}: {}", path.display(), e),
                }
                overrides.file_mtime = mtime;
            }
        }

        if changed {
            let mut merged = (**self.endpoints.read()).clone();
            merged.extend(overrides.env.clone());
            merged.extend(overrides.file.clone());
            *self.endpoints.write() = Arc::new(merged);
        }
    }
}

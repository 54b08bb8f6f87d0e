//! Gateway configuration
//!
//! Handles:
//! - Device list (name, brand, host, port, station id)
//! - Poll interval and simulated link latency
//! - Ingestion endpoint and API key
//!
//! Loaded once at startup from TOML, then overridden from the environment.
//! Only the API key can change afterwards (through the operator console).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "gateway.toml";
pub const CONFIG_PATH_ENV: &str = "NXD_GATEWAY_CONFIG";
pub const ENDPOINT_ENV: &str = "NXD_ENDPOINT";
pub const API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub endpoint: String,
    /// Empty means "not configured"; `start` refuses to run without it.
    pub api_key: String,
    pub poll_interval_ms: u64,
    pub network: NetworkConfig,
    pub devices: Vec<DeviceConfig>,
}

/// Simulated cellular link between gateway and cloud.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub simulate_latency: bool,
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub model: String,
    pub host: String,
    pub port: u16,
    pub station_id: u8,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "Modbus TCP".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            simulate_latency: true,
            latency_min_ms: 100,
            latency_max_ms: 500,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nxdata-production.up.railway.app/api/ingest".to_string(),
            api_key: String::new(),
            poll_interval_ms: 3000,
            network: NetworkConfig::default(),
            devices: vec![
                DeviceConfig {
                    name: "INJETORA_SIEMENS_01".to_string(),
                    brand: "Siemens".to_string(),
                    model: "S7-1200".to_string(),
                    host: "localhost".to_string(),
                    port: 502,
                    station_id: 1,
                    protocol: default_protocol(),
                },
                DeviceConfig {
                    name: "INJETORA_DELTA_01".to_string(),
                    brand: "Delta".to_string(),
                    model: "DVP-28SV".to_string(),
                    host: "localhost".to_string(),
                    port: 503,
                    station_id: 2,
                    protocol: default_protocol(),
                },
            ],
        }
    }
}

impl GatewayConfig {
    /// Resolve the config path: explicit flag, then `NXD_GATEWAY_CONFIG`,
    /// then `gateway.toml` in the working directory.
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("No config at {}, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config: GatewayConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded {} devices from {}", config.devices.len(), path.display());
        Ok(config)
    }

    /// Environment wins over the file for endpoint and key.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENDPOINT_ENV).ok(),
            std::env::var(API_KEY_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, api_key: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            info!("API key loaded from environment");
            self.api_key = key.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Invalid("no devices configured".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".to_string()));
        }
        if self.network.latency_min_ms > self.network.latency_max_ms {
            return Err(ConfigError::Invalid(format!(
                "latency_min_ms ({}) exceeds latency_max_ms ({})",
                self.network.latency_min_ms, self.network.latency_max_ms
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint is empty".to_string()));
        }
        Ok(())
    }
}

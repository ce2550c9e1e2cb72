//! Zap Engine Configuration Module
//!
//! Loads [`ZapConfig`] from a base TOML file, an optional environment
//! overlay next to it (`environments/<env>.toml`) and `ZAP_`-prefixed
//! environment variables, in that order of precedence.

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::registry::Registry;
use crate::service;

/// Main zap engine configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ZapConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub quote: QuoteConfig,

    /// Supported vaults, tokens and hybrid routes
    #[serde(default)]
    pub registry: Registry,
}

/// Chain and RPC settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub request_timeout_ms: u64,
}

/// Aggregator router settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RouterConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub routing_strategy: String,
    pub rate_limit_per_sec: u32,
    pub request_timeout_ms: u64,
}

/// Preflight simulation backend settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    pub base_url: String,
    pub account: Option<String>,
    pub project: Option<String>,
    pub access_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct QuoteConfig {
    pub default_slippage_bps: u32,
    pub price_cache_ttl_secs: u64,
    pub timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: service::network::MAINNET_CHAIN_ID,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            request_timeout_ms: service::network::RPC_TIMEOUT_MS,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: service::router::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            routing_strategy: service::router::DEFAULT_ROUTING_STRATEGY.to_string(),
            rate_limit_per_sec: service::router::DEFAULT_RATE_LIMIT_PER_SEC,
            request_timeout_ms: service::router::REQUEST_TIMEOUT_MS,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_url: service::simulation::DEFAULT_BASE_URL.to_string(),
            account: None,
            project: None,
            access_key: None,
        }
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            default_slippage_bps: service::quote::DEFAULT_SLIPPAGE_BPS,
            price_cache_ttl_secs: service::quote::PRICE_CACHE_TTL_SECS,
            timeout_ms: service::quote::QUOTE_TIMEOUT_MS,
        }
    }
}

impl ZapConfig {
    /// Load configuration from files with environment overrides
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/zap.toml"));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        // Environment overlays live next to the base file
        if let Some(env) = environment {
            let env_file = base
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // ZAP_ROUTER__API_KEY -> router.api_key
        builder = builder.add_source(
            Environment::with_prefix("ZAP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Expand `${VAR}` placeholders in endpoints and credentials
    pub fn expand_env_vars(&mut self) -> Result<()> {
        self.network.rpc_url = shellexpand::env(&self.network.rpc_url)
            .context("Failed to expand RPC URL")?
            .to_string();

        self.router.base_url = shellexpand::env(&self.router.base_url)
            .context("Failed to expand router URL")?
            .to_string();

        if let Some(key) = &self.router.api_key {
            let expanded = shellexpand::env(key).context("Failed to expand router API key")?;
            self.router.api_key = Some(expanded.to_string());
        }

        self.simulation.base_url = shellexpand::env(&self.simulation.base_url)
            .context("Failed to expand simulation URL")?
            .to_string();

        if let Some(key) = &self.simulation.access_key {
            let expanded =
                shellexpand::env(key).context("Failed to expand simulation access key")?;
            self.simulation.access_key = Some(expanded.to_string());
        }

        Ok(())
    }
}

/// Load, expand and validate in one step
pub fn load_config(path: Option<&Path>, environment: Option<&str>) -> Result<ZapConfig> {
    let mut config = ZapConfig::load(path, environment)?;
    config.expand_env_vars()?;
    config
        .registry
        .validate()
        .context("Invalid vault registry")?;
    debug!(
        vaults = config.registry.vaults.len(),
        hybrid_routes = config.registry.hybrid_routes.len(),
        "configuration loaded"
    );
    Ok(config)
}

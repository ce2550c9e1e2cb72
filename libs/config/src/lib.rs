//! # Zap Engine Configuration
//!
//! Configuration management, service defaults and the static registry of
//! supported vaults and pools for the zap engine.
//!
//! ## Features
//!
//! - **ZapConfig**: network, router, simulation and quote settings from TOML
//!   with environment overlays and `ZAP_` variable overrides
//! - **Registry**: supported vaults and hybrid wrap+swap routes, validated at load
//! - **Service Defaults**: protocol identifiers, timeouts, slippage and cache TTL
//!
//! ## Usage
//!
//! ```rust,no_run
//! use config::load_config;
//!
//! let config = load_config(None, Some("production"))?;
//! let vaults = &config.registry.vaults;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod registry;
pub mod service;
pub mod zap_config;

// Re-export commonly used types
pub use registry::{HybridRouteEntry, Registry, RegistryError, VaultEntry};
pub use zap_config::{
    load_config, NetworkConfig, QuoteConfig, RouterConfig, SimulationConfig, ZapConfig,
};

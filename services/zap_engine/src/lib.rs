//! # Zap Engine
//!
//! ## Purpose
//!
//! Off-chain quote and bundle engine for one-click vault entry, exit and
//! migration. Users name a token and a vault; the engine composes the ordered
//! action sequence an aggregator router executes atomically, estimates the
//! output with on-chain reads where the router cannot, and attaches USD
//! valuations for display.
//!
//! ## Integration Points
//!
//! - **Input**: [`config::ZapConfig`] (registry of vaults and hybrid routes),
//!   an Ethereum JSON-RPC endpoint, the router HTTP API
//! - **Output**: [`types::ZapQuote`] with a validated [`types::Bundle`] and the
//!   router's transaction payload
//! - **Optional**: preflight simulation with storage overrides
//!
//! ## Architecture Role
//!
//! ```text
//! Registry ──► composer ──► resolver ──► router_client ──► ZapQuote
//!                 ▲                            │
//!   snapshot ─► estimator ◄── price_feed ◄─────┘
//! ```
//!
//! Every external dependency sits behind a trait ([`PoolReader`],
//! [`VaultReader`], [`AggregatorRouter`], [`PriceSource`], [`Simulator`]) so
//! [`ZapService`] can be driven entirely by in-memory fakes in tests.

pub mod composer;
pub mod estimator;
pub mod logging;
pub mod price_feed;
pub mod resolver;
pub mod router_client;
pub mod service;
pub mod simulation;
pub mod slippage;
pub mod snapshot;
pub mod vault_reader;

pub use composer::{
    compose_hybrid, compose_vault_to_vault, compose_zap_in, compose_zap_out, HybridRequest,
    VaultToVaultRequest, ZapInRequest, ZapOutRequest,
};
pub use estimator::{HybridEstimate, QuoteEstimator};
pub use logging::LogEmoji;
pub use price_feed::{CachedPriceSource, PriceCache, PriceSource, RouterPriceSource};
pub use resolver::{RequestParams, RouterQuery, RouterRequest};
pub use router_client::{AggregatorRouter, RouteQuote, RouterClient, RouterError, RouterResponse};
pub use service::ZapService;
pub use simulation::{
    SimulationClient, SimulationError, SimulationOutcome, Simulator, StateOverrides, StorageLayout,
};
pub use slippage::apply_slippage;
pub use snapshot::{ContractReader, PoolReader};
pub use vault_reader::VaultReader;

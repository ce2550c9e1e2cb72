//! # Zap Domain Types
//!
//! Shared vocabulary for the zap quote and bundle engine: tokens, bundle
//! amounts, the per-kind action arguments the aggregator router accepts,
//! validated bundles and the advisory quotes shown to users.
//!
//! ## Integration Points
//!
//! - **Producers**: the bundle composer and quote estimator in `zap-engine`
//! - **Consumers**: the router request encoder, the CLI, and anything that
//!   renders a [`ZapQuote`]
//! - **Wire format**: `serde` encodings match the router's JSON shape
//!   (`{protocol, action, args}`, decimal-string amounts,
//!   `{"useOutputOfCallAt": n}` references)
//!
//! ## Invariants
//!
//! - A [`Bundle`] never holds a reference to its own or a later action's
//!   output; [`Bundle::new`] rejects such sequences in one pass.
//! - Argument structs are fixed per [`ActionKind`], so an action cannot carry
//!   fields that belong to a different kind.

pub mod amount;
pub mod bundle;
pub mod errors;
pub mod quote;
pub mod token;

pub use amount::Amount;
pub use bundle::{
    ActionArgs, ActionKind, ApproveArgs, Bundle, BundleAction, DepositArgs, ExchangeArgs,
    MintArgs, RedeemArgs, RouteArgs, MAX_SIMULATED_REFERENCE_DEPTH,
};
pub use errors::BundleError;
pub use quote::{HybridBreakdown, RouterTransaction, ZapFlow, ZapQuote};
pub use token::Token;

/// Common numeric types re-exported for consumers
pub use ethers_core::types::{Address, U256};
pub use rust_decimal::Decimal;

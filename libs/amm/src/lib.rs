//! # Zap AMM Library - Curve Invariant Replicas
//!
//! ## Purpose
//!
//! Exact off-chain replicas of the StableSwap and CryptoSwap invariant math so
//! that exchange outputs can be quoted from a snapshot of pool state without
//! an on-chain call. All arithmetic is 256-bit unsigned integer arithmetic
//! with truncating division in the same order as the pool contracts; any
//! overflow, division by zero or failed convergence is surfaced as an
//! [`AmmError`] instead of a wrapped or zero value.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Pool snapshots read by the zap engine's snapshot reader
//! - **Output Destinations**: Hybrid zap estimation (mint vs swap comparison)
//! - **Protocol Support**: Curve stableswap-ng two-coin pools, Curve v2 two-coin crypto pools
//! - **Precision**: Wei-exact for StableSwap; CryptoSwap converges relative to 1e-14
//!
//! ## Architecture Role
//!
//! ```text
//! on-chain reads ──► StableSwapSnapshot ─┐
//!                                        ├─► SwapCurve::get_dy ──► estimator
//! on-chain reads ──► CryptoSwapSnapshot ─┘
//! ```

mod checked;
pub mod cryptoswap;
pub mod errors;
pub mod pool_traits;
pub mod stableswap;

pub use cryptoswap::CryptoSwapSnapshot;
pub use errors::{AmmError, AmmResult};
pub use pool_traits::{CurveKind, PoolSnapshot, SwapCurve};
pub use stableswap::StableSwapSnapshot;

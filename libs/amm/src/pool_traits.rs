//! Unified swap-curve interface over the supported pool families

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

use crate::cryptoswap::CryptoSwapSnapshot;
use crate::errors::AmmResult;
use crate::stableswap::StableSwapSnapshot;

/// Pool family identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    /// Amplified constant-sum/constant-product hybrid for pegged assets
    Stable,
    /// Gamma-adjusted invariant with internal price scale for volatile pairs
    Crypto,
}

impl std::fmt::Display for CurveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurveKind::Stable => write!(f, "stableswap"),
            CurveKind::Crypto => write!(f, "cryptoswap"),
        }
    }
}

/// Anything that can quote an exchange of coin `i` for coin `j`
pub trait SwapCurve {
    fn kind(&self) -> CurveKind;

    /// Output in coin `j` base units for `dx` coin `i` base units, net of fees
    fn get_dy(&self, i: usize, j: usize, dx: U256) -> AmmResult<U256>;
}

impl SwapCurve for StableSwapSnapshot {
    fn kind(&self) -> CurveKind {
        CurveKind::Stable
    }

    fn get_dy(&self, i: usize, j: usize, dx: U256) -> AmmResult<U256> {
        StableSwapSnapshot::get_dy(self, i, j, dx)
    }
}

impl SwapCurve for CryptoSwapSnapshot {
    fn kind(&self) -> CurveKind {
        CurveKind::Crypto
    }

    fn get_dy(&self, i: usize, j: usize, dx: U256) -> AmmResult<U256> {
        CryptoSwapSnapshot::get_dy(self, i, j, dx)
    }
}

/// Snapshot of either family, as produced by an on-chain reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PoolSnapshot {
    Stable(StableSwapSnapshot),
    Crypto(CryptoSwapSnapshot),
}

impl SwapCurve for PoolSnapshot {
    fn kind(&self) -> CurveKind {
        match self {
            PoolSnapshot::Stable(_) => CurveKind::Stable,
            PoolSnapshot::Crypto(_) => CurveKind::Crypto,
        }
    }

    fn get_dy(&self, i: usize, j: usize, dx: U256) -> AmmResult<U256> {
        match self {
            PoolSnapshot::Stable(pool) => pool.get_dy(i, j, dx),
            PoolSnapshot::Crypto(pool) => pool.get_dy(i, j, dx),
        }
    }
}

impl From<StableSwapSnapshot> for PoolSnapshot {
    fn from(pool: StableSwapSnapshot) -> Self {
        PoolSnapshot::Stable(pool)
    }
}

impl From<CryptoSwapSnapshot> for PoolSnapshot {
    fn from(pool: CryptoSwapSnapshot) -> Self {
        PoolSnapshot::Crypto(pool)
    }
}

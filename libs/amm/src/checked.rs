//! Checked 256-bit arithmetic mirroring on-chain revert-on-overflow semantics

use ethers_core::types::U256;

use crate::errors::{AmmError, AmmResult};

#[inline]
pub(crate) fn add(a: U256, b: U256, ctx: &'static str) -> AmmResult<U256> {
    a.checked_add(b).ok_or(AmmError::Overflow(ctx))
}

#[inline]
pub(crate) fn sub(a: U256, b: U256, ctx: &'static str) -> AmmResult<U256> {
    a.checked_sub(b).ok_or(AmmError::Overflow(ctx))
}

#[inline]
pub(crate) fn mul(a: U256, b: U256, ctx: &'static str) -> AmmResult<U256> {
    a.checked_mul(b).ok_or(AmmError::Overflow(ctx))
}

/// Truncating division
#[inline]
pub(crate) fn div(a: U256, b: U256, ctx: &'static str) -> AmmResult<U256> {
    a.checked_div(b).ok_or(AmmError::DivisionByZero(ctx))
}

#[inline]
pub(crate) fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[inline]
pub(crate) fn exp10(n: usize) -> U256 {
    U256::exp10(n)
}

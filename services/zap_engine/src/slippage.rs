//! Slippage buffer for legs that cannot use a dynamic reference
//!
//! A buffered literal can still exceed what the router actually delivers if
//! its chosen path underperforms the estimate by more than the buffer.
//! Dynamic references are the fix for that; this is the fallback.

use types::U256;

/// Basis points in 100%
pub const MAX_BPS: u32 = 10_000;

/// `estimate · (10000 - bps) / 10000`, truncating. `bps ≥ 10000` yields zero.
pub fn apply_slippage(estimate: U256, slippage_bps: u32) -> U256 {
    if slippage_bps == 0 {
        return estimate;
    }
    if slippage_bps >= MAX_BPS {
        return U256::zero();
    }
    let keep = U256::from(MAX_BPS - slippage_bps);
    match estimate.checked_mul(keep) {
        Some(scaled) => scaled / U256::from(MAX_BPS),
        // only reachable near U256::MAX; divide first and accept the rounding
        None => estimate / U256::from(MAX_BPS) * keep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    #[test]
    fn test_three_percent_buffer() {
        assert_eq!(apply_slippage(e18(100), 300), e18(97));
    }

    #[test]
    fn test_zero_bps_is_identity() {
        assert_eq!(apply_slippage(e18(5), 0), e18(5));
        assert_eq!(apply_slippage(U256::MAX, 0), U256::MAX);
    }

    #[test]
    fn test_truncates() {
        // 999 * 9950 / 10000 = 994.005
        assert_eq!(apply_slippage(U256::from(999u64), 50), U256::from(994u64));
    }

    #[test]
    fn test_full_slippage_clamps_to_zero() {
        assert_eq!(apply_slippage(e18(1), MAX_BPS), U256::zero());
        assert_eq!(apply_slippage(e18(1), 20_000), U256::zero());
    }
}

//! StableSwap invariant math for two-coin pegged pools
//!
//! Integer replica of the stableswap-ng view functions. Every operation is a
//! checked 256-bit operation with truncating division, so results match the
//! pool's own `get_dy` to the wei as long as the snapshot is current.
//!
//! Invariant (n = 2):
//! `A·nⁿ·Σx + D = A·D·nⁿ + Dⁿ⁺¹ / (nⁿ·Πx)`

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checked::{abs_diff, add, div, exp10, mul, sub};
use crate::errors::{AmmError, AmmResult};

pub const N_COINS: usize = 2;
/// `A` is stored on-chain scaled by this factor
pub const A_PRECISION: u64 = 100;
/// Fees are expressed out of 1e10
pub const FEE_DENOMINATOR: u64 = 10_000_000_000;
/// Newton step budget shared by `get_d` and `get_y`
pub const MAX_ITERATIONS: usize = 255;

fn precision() -> U256 {
    exp10(18)
}

/// `Ann = A · A_PRECISION · N_COINS` for a raw amplification coefficient
pub fn ann_from_a(a: U256) -> AmmResult<U256> {
    mul(mul(a, U256::from(A_PRECISION), "ann")?, U256::from(N_COINS), "ann")
}

/// Rate multiplier normalising a token with `decimals` to 18-decimal `xp` units
pub fn rate_for_decimals(decimals: u8) -> U256 {
    exp10(36usize.saturating_sub(decimals as usize))
}

/// Invariant `D` via Newton-Raphson. Empty pools return zero without iterating.
pub fn get_d(xp: &[U256; N_COINS], ann: U256) -> AmmResult<U256> {
    let s = add(xp[0], xp[1], "get_d")?;
    if s.is_zero() {
        return Ok(U256::zero());
    }

    let n = U256::from(N_COINS);
    let a_precision = U256::from(A_PRECISION);
    let mut d = s;

    for _ in 0..MAX_ITERATIONS {
        let mut d_p = d;
        for x in xp {
            d_p = div(mul(d_p, d, "get_d")?, *x, "get_d")?;
        }
        d_p = div(d_p, n.pow(n), "get_d")?;

        let d_prev = d;
        // (Ann·S/A_P + D_P·N)·D / ((Ann − A_P)·D/A_P + (N+1)·D_P)
        let numerator = mul(
            add(
                div(mul(ann, s, "get_d")?, a_precision, "get_d")?,
                mul(d_p, n, "get_d")?,
                "get_d",
            )?,
            d,
            "get_d",
        )?;
        let denominator = add(
            div(
                mul(sub(ann, a_precision, "get_d")?, d, "get_d")?,
                a_precision,
                "get_d",
            )?,
            mul(n + 1, d_p, "get_d")?,
            "get_d",
        )?;
        d = div(numerator, denominator, "get_d")?;

        if abs_diff(d, d_prev) <= U256::one() {
            return Ok(d);
        }
    }

    debug!(?xp, %ann, "get_d exhausted iterations");
    Err(AmmError::DidNotConverge {
        solver: "get_d",
        iterations: MAX_ITERATIONS,
    })
}

/// Post-swap balance of coin `j` when coin `i` is moved to `x`, holding `d` fixed
pub fn get_y(
    i: usize,
    j: usize,
    x: U256,
    xp: &[U256; N_COINS],
    ann: U256,
    d: U256,
) -> AmmResult<U256> {
    if i == j || i >= N_COINS || j >= N_COINS {
        return Err(AmmError::InvalidIndex { i, j });
    }

    let n = U256::from(N_COINS);
    let a_precision = U256::from(A_PRECISION);
    let mut c = d;
    let mut s = U256::zero();

    for k in 0..N_COINS {
        let x_k = if k == i {
            x
        } else if k != j {
            xp[k]
        } else {
            continue;
        };
        s = add(s, x_k, "get_y")?;
        c = div(mul(c, d, "get_y")?, mul(x_k, n, "get_y")?, "get_y")?;
    }

    c = div(
        mul(mul(c, d, "get_y")?, a_precision, "get_y")?,
        mul(ann, n, "get_y")?,
        "get_y",
    )?;
    let b = add(s, div(mul(d, a_precision, "get_y")?, ann, "get_y")?, "get_y")?;

    let mut y = d;
    for _ in 0..MAX_ITERATIONS {
        let y_prev = y;
        // y = (y² + c) / (2y + b − D)
        let numerator = add(mul(y, y, "get_y")?, c, "get_y")?;
        let denominator = sub(add(mul(y, n, "get_y")?, b, "get_y")?, d, "get_y")?;
        y = div(numerator, denominator, "get_y")?;

        if abs_diff(y, y_prev) <= U256::one() {
            return Ok(y);
        }
    }

    debug!(i, j, %x, %d, "get_y exhausted iterations");
    Err(AmmError::DidNotConverge {
        solver: "get_y",
        iterations: MAX_ITERATIONS,
    })
}

/// Imbalance-scaled fee. A multiplier at or below `FEE_DENOMINATOR` disables scaling.
pub fn dynamic_fee(
    xpi: U256,
    xpj: U256,
    base_fee: U256,
    fee_multiplier: U256,
) -> AmmResult<U256> {
    let fee_denominator = U256::from(FEE_DENOMINATOR);
    if fee_multiplier <= fee_denominator {
        return Ok(base_fee);
    }

    let sum = add(xpi, xpj, "dynamic_fee")?;
    let xps2 = mul(sum, sum, "dynamic_fee")?;
    let imbalance = div(
        mul(
            mul(
                mul(sub(fee_multiplier, fee_denominator, "dynamic_fee")?, U256::from(4), "dynamic_fee")?,
                xpi,
                "dynamic_fee",
            )?,
            xpj,
            "dynamic_fee",
        )?,
        xps2,
        "dynamic_fee",
    )?;

    div(
        mul(fee_multiplier, base_fee, "dynamic_fee")?,
        add(imbalance, fee_denominator, "dynamic_fee")?,
        "dynamic_fee",
    )
}

/// Swap output for `dx` of coin `i` into coin `j`, net of the dynamic fee.
/// All amounts are in normalised `xp` units.
pub fn get_dy(
    i: usize,
    j: usize,
    dx: U256,
    xp: &[U256; N_COINS],
    ann: U256,
    base_fee: U256,
    fee_multiplier: U256,
) -> AmmResult<U256> {
    if i == j || i >= N_COINS || j >= N_COINS {
        return Err(AmmError::InvalidIndex { i, j });
    }

    let x = add(xp[i], dx, "get_dy")?;
    let d = get_d(xp, ann)?;
    let y = get_y(i, j, x, xp, ann, d)?;
    // -1 rounds in the pool's favour
    let dy = sub(sub(xp[j], y, "get_dy")?, U256::one(), "get_dy")?;

    let two = U256::from(2);
    let fee = dynamic_fee(
        div(add(xp[i], x, "get_dy")?, two, "get_dy")?,
        div(add(xp[j], y, "get_dy")?, two, "get_dy")?,
        base_fee,
        fee_multiplier,
    )?;
    let fee_amount = div(mul(fee, dy, "get_dy")?, U256::from(FEE_DENOMINATOR), "get_dy")?;

    sub(dy, fee_amount, "get_dy")
}

/// Coin 0 into coin 1
pub fn get_dy_offchain(
    dx: U256,
    xp: &[U256; N_COINS],
    ann: U256,
    base_fee: U256,
    fee_multiplier: U256,
) -> AmmResult<U256> {
    get_dy(0, 1, dx, xp, ann, base_fee, fee_multiplier)
}

/// Point-in-time StableSwap pool state, captured once per quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableSwapSnapshot {
    /// Balances normalised to 18 decimals (`balance · rate / 1e18`)
    pub xp: [U256; N_COINS],
    /// Per-coin rate multipliers used for normalisation
    pub rates: [U256; N_COINS],
    /// Raw amplification coefficient as returned by `A()`
    pub a: U256,
    /// Base fee out of `FEE_DENOMINATOR`
    pub base_fee: U256,
    /// Off-peg fee multiplier out of `FEE_DENOMINATOR`
    pub offpeg_fee_multiplier: U256,
}

impl StableSwapSnapshot {
    /// Build from raw token balances and their rate multipliers
    pub fn from_balances(
        balances: [U256; N_COINS],
        rates: [U256; N_COINS],
        a: U256,
        base_fee: U256,
        offpeg_fee_multiplier: U256,
    ) -> AmmResult<Self> {
        let mut xp = [U256::zero(); N_COINS];
        for k in 0..N_COINS {
            xp[k] = div(mul(balances[k], rates[k], "snapshot")?, precision(), "snapshot")?;
        }
        Ok(Self {
            xp,
            rates,
            a,
            base_fee,
            offpeg_fee_multiplier,
        })
    }

    pub fn ann(&self) -> AmmResult<U256> {
        ann_from_a(self.a)
    }

    pub fn invariant(&self) -> AmmResult<U256> {
        get_d(&self.xp, self.ann()?)
    }

    /// Output in coin `j` base units for `dx` coin `i` base units
    pub fn get_dy(&self, i: usize, j: usize, dx: U256) -> AmmResult<U256> {
        if i == j || i >= N_COINS || j >= N_COINS {
            return Err(AmmError::InvalidIndex { i, j });
        }
        let dx_xp = div(mul(dx, self.rates[i], "snapshot")?, precision(), "snapshot")?;
        let dy_xp = get_dy(
            i,
            j,
            dx_xp,
            &self.xp,
            self.ann()?,
            self.base_fee,
            self.offpeg_fee_multiplier,
        )?;
        div(mul(dy_xp, precision(), "snapshot")?, self.rates[j], "snapshot")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn e18(n: u64) -> U256 {
        U256::from(n) * exp10(18)
    }

    fn ann37() -> U256 {
        ann_from_a(U256::from(37u64)).unwrap()
    }

    #[test]
    fn test_empty_pool_invariant_is_zero() {
        let d = get_d(&[U256::zero(), U256::zero()], ann37()).unwrap();
        assert_eq!(d, U256::zero());
    }

    #[test]
    fn test_balanced_pool_invariant() {
        let d = get_d(&[e18(1000), e18(1000)], ann37()).unwrap();
        let target = e18(2000);
        let tolerance = target / 100;
        assert!(abs_diff(d, target) <= tolerance, "D = {}", d);
    }

    #[test]
    fn test_imbalanced_pool_invariant_bounds() {
        let xp = [e18(50_000), e18(70_000)];
        let d = get_d(&xp, ann37()).unwrap();
        let sum = xp[0] + xp[1];
        let twice_min = xp[0] * 2;
        assert!(d < sum, "D {} should be below sum {}", d, sum);
        assert!(d > twice_min, "D {} should exceed 2*min {}", d, twice_min);
    }

    #[test]
    fn test_get_y_preserves_invariant() {
        let xp = [e18(50_000), e18(70_000)];
        let ann = ann37();
        let d = get_d(&xp, ann).unwrap();
        let x = xp[0] + e18(1_000);
        let y = get_y(0, 1, x, &xp, ann, d).unwrap();
        assert!(y < xp[1]);

        let d_after = get_d(&[x, y], ann).unwrap();
        assert!(abs_diff(d, d_after) <= U256::from(1_000u64));
    }

    #[test]
    fn test_get_y_rejects_bad_indices() {
        let xp = [e18(10), e18(10)];
        assert_eq!(
            get_y(0, 0, e18(1), &xp, ann37(), e18(20)),
            Err(AmmError::InvalidIndex { i: 0, j: 0 })
        );
        assert_eq!(
            get_y(0, 2, e18(1), &xp, ann37(), e18(20)),
            Err(AmmError::InvalidIndex { i: 0, j: 2 })
        );
    }

    #[test]
    fn test_diminishing_marginal_rate() {
        let xp = [e18(50_000), e18(70_000)];
        let ann = ann37();
        let fee = U256::from(1_000_000u64); // 0.01%
        let multiplier = U256::from(20_000_000_000u64);

        let small_dx = e18(1_000);
        let large_dx = e18(50_000);
        let small_dy = get_dy_offchain(small_dx, &xp, ann, fee, multiplier).unwrap();
        let large_dy = get_dy_offchain(large_dx, &xp, ann, fee, multiplier).unwrap();

        // large_dy / large_dx < small_dy / small_dx
        assert!(large_dy * small_dx < small_dy * large_dx);
    }

    #[test]
    fn test_dynamic_fee_passthrough_at_or_below_denominator() {
        let base = U256::from(4_000_000u64);
        for multiplier in [0u64, 1, FEE_DENOMINATOR] {
            let fee = dynamic_fee(e18(10), e18(90), base, U256::from(multiplier)).unwrap();
            assert_eq!(fee, base);
        }
    }

    #[test]
    fn test_dynamic_fee_grows_with_imbalance() {
        let base = U256::from(4_000_000u64);
        let multiplier = U256::from(20_000_000_000u64);
        let balanced = dynamic_fee(e18(50), e18(50), base, multiplier).unwrap();
        let imbalanced = dynamic_fee(e18(10), e18(90), base, multiplier).unwrap();
        assert_eq!(balanced, base);
        assert!(imbalanced > balanced);
    }

    #[test]
    fn test_snapshot_normalises_decimals() {
        // 6-decimal coin 0 against 18-decimal coin 1
        let snapshot = StableSwapSnapshot::from_balances(
            [U256::from(1_000_000u64) * U256::from(1_000_000u64), e18(1_000_000)],
            [rate_for_decimals(6), rate_for_decimals(18)],
            U256::from(200u64),
            U256::from(1_000_000u64),
            U256::from(FEE_DENOMINATOR),
        )
        .unwrap();
        assert_eq!(snapshot.xp[0], snapshot.xp[1]);

        let dy = snapshot.get_dy(0, 1, U256::from(1_000_000u64)).unwrap();
        // one unit in, just under one unit out
        assert!(dy < e18(1));
        assert!(dy > e18(1) * 999u64 / 1000u64);
    }

    proptest! {
        #[test]
        fn prop_balanced_invariant_equals_sum(units in 1u64..1_000_000_000, a in 1u64..5_000) {
            let x = e18(units);
            let d = get_d(&[x, x], ann_from_a(U256::from(a)).unwrap()).unwrap();
            prop_assert!(abs_diff(d, x * 2) <= U256::one());
        }

        #[test]
        fn prop_output_never_drains_pool(dx_units in 1u64..10_000_000) {
            let xp = [e18(50_000), e18(70_000)];
            let dy = get_dy_offchain(e18(dx_units), &xp, ann37(), U256::from(1_000_000u64), U256::from(20_000_000_000u64)).unwrap();
            prop_assert!(dy < xp[1]);
        }
    }
}

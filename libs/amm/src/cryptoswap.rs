//! CryptoSwap invariant math for two-coin volatile pools
//!
//! Replica of the Curve v2 two-coin pool math: the gamma-adjusted invariant
//! solved with `newton_d`, the balance solver `newton_y` and the
//! imbalance-weighted `fee`. Unlike StableSwap, balances are scaled by an
//! internal `price_scale` before entering the invariant, and convergence is
//! relative rather than to the last wei.

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checked::{abs_diff, add, div, exp10, mul, sub};
use crate::errors::{AmmError, AmmResult};

pub const N_COINS: usize = 2;
pub const A_MULTIPLIER: u64 = 10_000;
pub const MIN_GAMMA: u64 = 10_000_000_000;
pub const MAX_GAMMA: u64 = 20_000_000_000_000_000;
/// `N^N · A_MULTIPLIER / 10`
pub const MIN_A: u64 = 4 * A_MULTIPLIER / 10;
/// `N^N · A_MULTIPLIER · 100_000`
pub const MAX_A: u64 = 4 * A_MULTIPLIER * 100_000;
/// Fees are expressed out of 1e10
pub const FEE_DENOMINATOR: u64 = 10_000_000_000;
pub const MAX_ITERATIONS: usize = 255;

fn e18() -> U256 {
    exp10(18)
}

fn check_params(ann: U256, gamma: U256) -> AmmResult<()> {
    if ann < U256::from(MIN_A) || ann > U256::from(MAX_A) {
        return Err(AmmError::UnsafeValue("A outside [MIN_A, MAX_A]"));
    }
    if gamma < U256::from(MIN_GAMMA) || gamma > U256::from(MAX_GAMMA) {
        return Err(AmmError::UnsafeValue("gamma outside [MIN_GAMMA, MAX_GAMMA]"));
    }
    Ok(())
}

/// `|gamma + 1e18 - K0| + 1`
fn g1k0(gamma: U256, k0: U256) -> AmmResult<U256> {
    let g = add(gamma, e18(), "g1k0")?;
    if g > k0 {
        add(g - k0, U256::one(), "g1k0")
    } else {
        add(k0 - g, U256::one(), "g1k0")
    }
}

/// `1e18·D/γ·g1k0/γ·g1k0·A_MULTIPLIER/ANN`, i.e. `D/(A·Nᴺ)·g1k0²/γ²`
fn mul1(d: U256, gamma: U256, g1k0: U256, ann: U256, ctx: &'static str) -> AmmResult<U256> {
    let mut v = div(mul(e18(), d, ctx)?, gamma, ctx)?;
    v = div(mul(v, g1k0, ctx)?, gamma, ctx)?;
    v = mul(mul(v, g1k0, ctx)?, U256::from(A_MULTIPLIER), ctx)?;
    div(v, ann, ctx)
}

/// Two-coin geometric mean, used to seed `newton_d`
pub fn geometric_mean(x: [U256; N_COINS], sort: bool) -> AmmResult<U256> {
    let mut x = x;
    if sort && x[0] < x[1] {
        x.swap(0, 1);
    }

    let two = U256::from(2);
    let mut d = x[0];
    for _ in 0..MAX_ITERATIONS {
        let d_prev = d;
        d = div(
            add(d, div(mul(x[0], x[1], "geometric_mean")?, d, "geometric_mean")?, "geometric_mean")?,
            two,
            "geometric_mean",
        )?;
        let diff = abs_diff(d, d_prev);
        if diff <= U256::one() || mul(diff, e18(), "geometric_mean")? < d {
            return Ok(d);
        }
    }

    Err(AmmError::DidNotConverge {
        solver: "geometric_mean",
        iterations: MAX_ITERATIONS,
    })
}

/// Invariant `D` of the gamma-adjusted curve for price-scaled balances
pub fn newton_d(ann: U256, gamma: U256, x_unsorted: [U256; N_COINS]) -> AmmResult<U256> {
    check_params(ann, gamma)?;

    let mut x = x_unsorted;
    if x[0] < x[1] {
        x.swap(0, 1);
    }
    if x[0] < exp10(9) || x[0] > mul(exp10(15), e18(), "newton_d")? {
        return Err(AmmError::UnsafeValue("newton_d: x[0] out of range"));
    }
    if div(mul(x[1], e18(), "newton_d")?, x[0], "newton_d")? < exp10(14) {
        return Err(AmmError::UnsafeValue("newton_d: balances too imbalanced"));
    }

    let n = U256::from(N_COINS);
    let mut d = mul(n, geometric_mean(x, false)?, "newton_d")?;
    let s = add(x[0], x[1], "newton_d")?;

    for _ in 0..MAX_ITERATIONS {
        let d_prev = d;

        let mut k0 = mul(mul(e18(), n * n, "newton_d")?, x[0], "newton_d")?;
        k0 = div(k0, d, "newton_d")?;
        k0 = div(mul(k0, x[1], "newton_d")?, d, "newton_d")?;

        let g = g1k0(gamma, k0)?;
        let m1 = mul1(d, gamma, g, ann, "newton_d")?;
        // 2·N·K0 / g1k0
        let m2 = div(mul(mul(e18() * 2, n, "newton_d")?, k0, "newton_d")?, g, "newton_d")?;

        let neg_fprime = sub(
            add(
                add(s, div(mul(s, m2, "newton_d")?, e18(), "newton_d")?, "newton_d")?,
                div(mul(m1, n, "newton_d")?, k0, "newton_d")?,
                "newton_d",
            )?,
            div(mul(m2, d, "newton_d")?, e18(), "newton_d")?,
            "newton_d",
        )?;

        let d_plus = div(mul(d, add(neg_fprime, s, "newton_d")?, "newton_d")?, neg_fprime, "newton_d")?;
        let mut d_minus = div(mul(d, d, "newton_d")?, neg_fprime, "newton_d")?;
        let correction_base = div(
            mul(d, div(m1, neg_fprime, "newton_d")?, "newton_d")?,
            e18(),
            "newton_d",
        )?;
        if e18() > k0 {
            let correction = div(mul(correction_base, e18() - k0, "newton_d")?, k0, "newton_d")?;
            d_minus = add(d_minus, correction, "newton_d")?;
        } else {
            let correction = div(mul(correction_base, k0 - e18(), "newton_d")?, k0, "newton_d")?;
            d_minus = sub(d_minus, correction, "newton_d")?;
        }

        d = if d_plus > d_minus {
            d_plus - d_minus
        } else {
            (d_minus - d_plus) / 2
        };

        let diff = abs_diff(d, d_prev);
        if mul(diff, exp10(14), "newton_d")? < d.max(exp10(16)) {
            for x_k in x {
                let frac = div(mul(x_k, e18(), "newton_d")?, d, "newton_d")?;
                if frac < exp10(16) || frac > exp10(20) {
                    return Err(AmmError::UnsafeValue("newton_d: unsafe balance fraction"));
                }
            }
            return Ok(d);
        }
    }

    debug!(%ann, %gamma, "newton_d exhausted iterations");
    Err(AmmError::DidNotConverge {
        solver: "newton_d",
        iterations: MAX_ITERATIONS,
    })
}

/// Price-scaled balance of coin `i` that keeps invariant `d` with the other balance fixed
pub fn newton_y(ann: U256, gamma: U256, x: [U256; N_COINS], d: U256, i: usize) -> AmmResult<U256> {
    if i >= N_COINS {
        return Err(AmmError::InvalidIndex { i, j: i });
    }
    check_params(ann, gamma)?;
    if d < exp10(17) || d > mul(exp10(15), e18(), "newton_y")? {
        return Err(AmmError::UnsafeValue("newton_y: D out of range"));
    }

    let n = U256::from(N_COINS);
    let x_j = x[1 - i];
    let mut y = div(mul(d, d, "newton_y")?, mul(x_j, n * n, "newton_y")?, "newton_y")?;
    let k0_i = div(mul(mul(e18(), n, "newton_y")?, x_j, "newton_y")?, d, "newton_y")?;
    if k0_i < exp10(16) * n || k0_i > exp10(20) * n {
        return Err(AmmError::UnsafeValue("newton_y: unsafe x[j]"));
    }

    let convergence_limit = (x_j / exp10(14)).max(d / exp10(14)).max(U256::from(100));

    for _ in 0..MAX_ITERATIONS {
        let y_prev = y;
        let k0 = div(mul(mul(k0_i, y, "newton_y")?, n, "newton_y")?, d, "newton_y")?;
        let s = add(x_j, y, "newton_y")?;

        let g = g1k0(gamma, k0)?;
        let m1 = mul1(d, gamma, g, ann, "newton_y")?;
        // 1 + 2·K0 / g1k0
        let m2 = add(e18(), div(mul(e18() * 2, k0, "newton_y")?, g, "newton_y")?, "newton_y")?;

        let mut yfprime = add(
            add(mul(e18(), y, "newton_y")?, mul(s, m2, "newton_y")?, "newton_y")?,
            m1,
            "newton_y",
        )?;
        let dyfprime = mul(d, m2, "newton_y")?;
        if yfprime < dyfprime {
            y = y_prev / 2;
            continue;
        }
        yfprime -= dyfprime;
        let fprime = div(yfprime, y, "newton_y")?;

        let mut y_minus = div(m1, fprime, "newton_y")?;
        let y_plus = add(
            div(add(yfprime, mul(e18(), d, "newton_y")?, "newton_y")?, fprime, "newton_y")?,
            div(mul(y_minus, e18(), "newton_y")?, k0, "newton_y")?,
            "newton_y",
        )?;
        y_minus = add(y_minus, div(mul(e18(), s, "newton_y")?, fprime, "newton_y")?, "newton_y")?;

        y = if y_plus < y_minus {
            y_prev / 2
        } else {
            y_plus - y_minus
        };

        let diff = abs_diff(y, y_prev);
        if diff < convergence_limit.max(y / exp10(14)) {
            let frac = div(mul(y, e18(), "newton_y")?, d, "newton_y")?;
            if frac < exp10(16) || frac > exp10(20) {
                return Err(AmmError::UnsafeValue("newton_y: unsafe value for y"));
            }
            return Ok(y);
        }
    }

    debug!(i, %d, "newton_y exhausted iterations");
    Err(AmmError::DidNotConverge {
        solver: "newton_y",
        iterations: MAX_ITERATIONS,
    })
}

/// Fee out of 1e10: `mid_fee` at balance, drifting to `out_fee` as the pool skews
pub fn fee(xp: [U256; N_COINS], mid_fee: U256, out_fee: U256, fee_gamma: U256) -> AmmResult<U256> {
    let sum = add(xp[0], xp[1], "fee")?;
    // 1e18 · Nᴺ · x0/Σ · x1/Σ
    let mut k = div(mul(mul(e18(), U256::from(4), "fee")?, xp[0], "fee")?, sum, "fee")?;
    k = div(mul(k, xp[1], "fee")?, sum, "fee")?;
    let f = div(
        mul(fee_gamma, e18(), "fee")?,
        sub(add(fee_gamma, e18(), "fee")?, k, "fee")?,
        "fee",
    )?;
    div(
        add(mul(mid_fee, f, "fee")?, mul(out_fee, sub(e18(), f, "fee")?, "fee")?, "fee")?,
        e18(),
        "fee",
    )
}

/// Point-in-time CryptoSwap pool state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSwapSnapshot {
    /// Raw token balances
    pub balances: [U256; N_COINS],
    /// `10^(18 - decimals)` per coin
    pub precisions: [U256; N_COINS],
    /// Internal price of coin 1 in coin 0, 1e18-scaled
    pub price_scale: U256,
    /// Amplification as stored on-chain (already `A·Nᴺ·A_MULTIPLIER`)
    pub ann: U256,
    pub gamma: U256,
    /// Stored invariant; zero means recompute from balances
    pub d: U256,
    pub mid_fee: U256,
    pub out_fee: U256,
    pub fee_gamma: U256,
}

impl CryptoSwapSnapshot {
    /// Balances in the price-scaled space the invariant operates on
    pub fn xp(&self) -> AmmResult<[U256; N_COINS]> {
        self.scale([self.balances[0], self.balances[1]])
    }

    fn scale(&self, balances: [U256; N_COINS]) -> AmmResult<[U256; N_COINS]> {
        let price_scale = mul(self.price_scale, self.precisions[1], "crypto_snapshot")?;
        Ok([
            mul(balances[0], self.precisions[0], "crypto_snapshot")?,
            div(mul(balances[1], price_scale, "crypto_snapshot")?, e18(), "crypto_snapshot")?,
        ])
    }

    pub fn invariant(&self) -> AmmResult<U256> {
        if self.d.is_zero() {
            newton_d(self.ann, self.gamma, self.xp()?)
        } else {
            Ok(self.d)
        }
    }

    /// Output in coin `j` base units for `dx` coin `i` base units, net of fee
    pub fn get_dy(&self, i: usize, j: usize, dx: U256) -> AmmResult<U256> {
        if i == j || i >= N_COINS || j >= N_COINS {
            return Err(AmmError::InvalidIndex { i, j });
        }

        let d = self.invariant()?;
        let mut balances = self.balances;
        balances[i] = add(balances[i], dx, "crypto_get_dy")?;
        let mut xp = self.scale(balances)?;

        let y = newton_y(self.ann, self.gamma, xp, d, j)?;
        let mut dy = sub(sub(xp[j], y, "crypto_get_dy")?, U256::one(), "crypto_get_dy")?;
        xp[j] = y;

        dy = if j > 0 {
            let price_scale = mul(self.price_scale, self.precisions[1], "crypto_get_dy")?;
            div(mul(dy, e18(), "crypto_get_dy")?, price_scale, "crypto_get_dy")?
        } else {
            div(dy, self.precisions[0], "crypto_get_dy")?
        };

        let fee_rate = fee(xp, self.mid_fee, self.out_fee, self.fee_gamma)?;
        let fee_amount = div(mul(fee_rate, dy, "crypto_get_dy")?, U256::from(FEE_DENOMINATOR), "crypto_get_dy")?;
        sub(dy, fee_amount, "crypto_get_dy")
    }
}

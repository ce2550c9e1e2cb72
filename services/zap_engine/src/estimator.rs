//! # Quote Estimator
//!
//! ## Purpose
//!
//! Advisory numbers for display: the output of hybrid wrap+swap paths the
//! router cannot quote atomically, USD valuations, exchange rates and price
//! impact. Nothing produced here is fed into an executed bundle as a literal
//! amount when a dynamic reference is available.
//!
//! ## Integration Points
//!
//! - **Input**: pool snapshots behind [`SwapCurve`], USD prices from the price feed
//! - **Output**: [`HybridEstimate`] and display fields of a [`types::ZapQuote`]

use config::service::protocols;
use config::HybridRouteEntry;
use rust_decimal::Decimal;
use types::{HybridBreakdown, U256};
use zap_amm::{AmmResult, SwapCurve};

/// Advisory output of a hybrid route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridEstimate {
    /// Pool output for the minted amount
    pub swap_output: U256,
    pub breakdown: HybridBreakdown,
}

pub struct QuoteEstimator;

impl QuoteEstimator {
    /// Mint `mint_amount` of the wrapped token 1:1, then swap it through the pool.
    /// `input_is_intermediate` is true when the caller already holds the
    /// intermediate token and no route leg precedes the mint.
    pub fn estimate_hybrid(
        mint_amount: U256,
        input_is_intermediate: bool,
        curve: &dyn SwapCurve,
        route: &HybridRouteEntry,
    ) -> AmmResult<HybridEstimate> {
        let swap_output = curve.get_dy(route.pool_i, route.pool_j, mint_amount)?;

        Ok(HybridEstimate {
            swap_output,
            breakdown: HybridBreakdown {
                mint_amount,
                swap_amount: swap_output,
                bonus_pct: Self::bonus_pct(mint_amount, swap_output),
                route_protocol: (!input_is_intermediate).then(|| protocols::ROUTE.to_string()),
                mint_protocol: route.mint_protocol.clone(),
                swap_protocol: route.swap_protocol.clone(),
            },
        })
    }

    /// Percentage the swap returns over a plain 1:1 mint
    pub fn bonus_pct(mint_amount: U256, swap_amount: U256) -> Option<Decimal> {
        let mint = to_decimal(mint_amount, 0)?;
        let swap = to_decimal(swap_amount, 0)?;
        let ratio = swap.checked_sub(mint)?.checked_div(mint)?;
        ratio.checked_mul(Decimal::ONE_HUNDRED)
    }

    /// `(input - output) / input · 100`; `None` when the input is worth nothing
    pub fn price_impact(input_usd: Decimal, output_usd: Decimal) -> Option<Decimal> {
        if input_usd.is_zero() {
            return None;
        }
        (input_usd - output_usd)
            .checked_div(input_usd)?
            .checked_mul(Decimal::ONE_HUNDRED)
    }

    /// USD value of `amount` base units at `price` per whole token
    pub fn usd_value(amount: U256, decimals: u8, price: Decimal) -> Option<Decimal> {
        to_decimal(amount, decimals)?.checked_mul(price)
    }

    /// Whole output tokens per whole input token
    pub fn exchange_rate(amount_in: U256, decimals_in: u8, amount_out: U256, decimals_out: u8) -> Option<Decimal> {
        let amount_in = to_decimal(amount_in, decimals_in)?;
        if amount_in.is_zero() {
            return None;
        }
        to_decimal(amount_out, decimals_out)?.checked_div(amount_in)
    }
}

/// Base units to a `Decimal` of whole tokens, dropping digits the 96-bit mantissa cannot hold
pub fn to_decimal(amount: U256, decimals: u8) -> Option<Decimal> {
    let mut value = amount;
    let mut scale = decimals as u32;
    while value.bits() > 96 || scale > 28 {
        if scale == 0 {
            return None;
        }
        value /= U256::from(10u64);
        scale -= 1;
    }
    Decimal::try_from_i128_with_scale(value.as_u128() as i128, scale).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use types::Address;
    use zap_amm::{AmmError, CurveKind};

    struct FixedRate {
        numerator: u64,
        denominator: u64,
    }

    impl SwapCurve for FixedRate {
        fn kind(&self) -> CurveKind {
            CurveKind::Stable
        }

        fn get_dy(&self, i: usize, j: usize, dx: U256) -> AmmResult<U256> {
            if i == j {
                return Err(AmmError::InvalidIndex { i, j });
            }
            Ok(dx * self.numerator / self.denominator)
        }
    }

    fn route() -> HybridRouteEntry {
        HybridRouteEntry {
            name: "test".to_string(),
            intermediate: Address::repeat_byte(1),
            wrapped: Address::repeat_byte(2),
            wrapper: Address::repeat_byte(2),
            mint_protocol: "yearn".to_string(),
            pool: Address::repeat_byte(3),
            pool_kind: CurveKind::Stable,
            pool_i: 0,
            pool_j: 1,
            output: Address::repeat_byte(4),
            vault: Address::repeat_byte(5),
            swap_protocol: "curve".to_string(),
        }
    }

    #[test]
    fn test_price_impact() {
        assert_eq!(QuoteEstimator::price_impact(dec!(100), dec!(90)), Some(dec!(10)));
        assert_eq!(QuoteEstimator::price_impact(dec!(100), dec!(110)), Some(dec!(-10)));
        assert_eq!(QuoteEstimator::price_impact(dec!(0), dec!(5)), None);
        assert_eq!(QuoteEstimator::price_impact(Decimal::ZERO, Decimal::ZERO), None);
    }

    #[test]
    fn test_usd_value() {
        let amount = U256::from(2_500_000u64); // 2.5 USDC
        assert_eq!(QuoteEstimator::usd_value(amount, 6, dec!(1.0)), Some(dec!(2.5)));

        let eth = U256::exp10(18) * 3u64;
        assert_eq!(QuoteEstimator::usd_value(eth, 18, dec!(2000)), Some(dec!(6000)));
    }

    #[test]
    fn test_to_decimal_handles_large_amounts() {
        // 1e30 base units at 18 decimals = 1e12 tokens, beyond 96 bits raw
        let big = U256::exp10(30);
        assert_eq!(to_decimal(big, 18), Some(dec!(1_000_000_000_000)));
        assert_eq!(to_decimal(U256::MAX, 0), None);
    }

    #[test]
    fn test_exchange_rate_across_decimals() {
        let usdc_in = U256::from(2_000_000_000u64); // 2000 USDC
        let eth_out = U256::exp10(18); // 1 ETH
        assert_eq!(
            QuoteEstimator::exchange_rate(usdc_in, 6, eth_out, 18),
            Some(dec!(0.0005))
        );
        assert_eq!(QuoteEstimator::exchange_rate(U256::zero(), 6, eth_out, 18), None);
    }

    #[test]
    fn test_hybrid_estimate_reports_bonus() {
        let curve = FixedRate {
            numerator: 105,
            denominator: 100,
        };
        let amount = U256::exp10(18) * 100u64;
        let estimate = QuoteEstimator::estimate_hybrid(amount, true, &curve, &route()).unwrap();

        assert_eq!(estimate.swap_output, U256::exp10(18) * 105u64);
        assert_eq!(estimate.breakdown.mint_amount, amount);
        assert_eq!(estimate.breakdown.bonus_pct, Some(dec!(5)));
        assert_eq!(estimate.breakdown.route_protocol, None);
        assert_eq!(estimate.breakdown.swap_protocol, "curve");
    }

    #[test]
    fn test_hybrid_estimate_with_route_leg() {
        let curve = FixedRate {
            numerator: 98,
            denominator: 100,
        };
        let estimate = QuoteEstimator::estimate_hybrid(U256::from(1_000u64), false, &curve, &route()).unwrap();
        assert_eq!(estimate.breakdown.bonus_pct, Some(dec!(-2)));
        assert_eq!(estimate.breakdown.route_protocol.as_deref(), Some("enso"));
    }

    #[test]
    fn test_bonus_undefined_for_zero_mint() {
        assert_eq!(QuoteEstimator::bonus_pct(U256::zero(), U256::one()), None);
    }
}

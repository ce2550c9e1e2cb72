//! Advisory zap quotes
//!
//! Quotes are created per request and discarded when the request completes.
//! The amounts here are for display; the bundle they carry stays correct even
//! when the router's actual execution path diverges from the estimate.

use ethers_core::types::{Address, Bytes, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::{opt_u256_dec, u256_dec};
use crate::bundle::Bundle;
use crate::token::Token;

/// Zap flow kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZapFlow {
    /// Token into vault shares
    ZapIn,
    /// Vault shares into a token
    ZapOut,
    /// Shares of one vault into shares of another
    VaultToVault,
    /// Route, 1:1 wrap, pool exchange, vault deposit
    Hybrid,
}

impl fmt::Display for ZapFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZapFlow::ZapIn => "zap-in",
            ZapFlow::ZapOut => "zap-out",
            ZapFlow::VaultToVault => "vault-to-vault",
            ZapFlow::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Signed transaction payload returned by the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterTransaction {
    pub to: Address,
    pub data: Bytes,
    #[serde(with = "u256_dec")]
    pub value: U256,
}

/// Display breakdown of a wrap-then-swap route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridBreakdown {
    /// Amount entering the 1:1 wrap (equals the wrapped amount)
    #[serde(with = "u256_dec")]
    pub mint_amount: U256,
    /// Estimated pool output for the wrapped amount
    #[serde(with = "u256_dec")]
    pub swap_amount: U256,
    /// Pool output relative to the 1:1 peg, in percent. Negative is a discount.
    pub bonus_pct: Option<Decimal>,
    /// Protocol of the leading aggregator leg, absent when skipped
    pub route_protocol: Option<String>,
    pub mint_protocol: String,
    pub swap_protocol: String,
}

/// Everything the UI shows for one zap request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZapQuote {
    pub flow: ZapFlow,
    pub token_in: Token,
    pub token_out: Token,
    #[serde(with = "u256_dec")]
    pub amount_in: U256,
    #[serde(with = "u256_dec")]
    pub estimated_output: U256,
    /// Whole output tokens per whole input token
    pub exchange_rate: Option<Decimal>,
    /// Percent of USD value lost; `None` when USD pricing is unavailable
    pub price_impact: Option<Decimal>,
    #[serde(with = "opt_u256_dec", skip_serializing_if = "Option::is_none")]
    pub gas_estimate: Option<U256>,
    pub bundle: Bundle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<HybridBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<RouterTransaction>,
}

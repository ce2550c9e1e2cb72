//! ERC-20 token reference data

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable token reference data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Contract address
    pub address: Address,
    /// ERC-20 decimals (18 for WETH, 6 for USDC)
    pub decimals: u8,
    /// Display symbol
    pub symbol: String,
}

impl Token {
    pub fn new(address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            address,
            decimals,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.symbol, self.address)
    }
}

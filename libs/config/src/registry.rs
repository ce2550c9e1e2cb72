//! Static registry of supported vaults, tokens and hybrid routes
//!
//! Which vaults and pools are supported is fixed configuration, not
//! something discovered on-chain. The registry is loaded with the rest of
//! [`ZapConfig`](crate::ZapConfig) and validated once at startup.

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::Token;
use zap_amm::CurveKind;

use crate::service::protocols;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("vault {symbol} ({address:?}) lists itself as its underlying asset")]
    SelfUnderlying { symbol: String, address: Address },

    #[error("vault {0:?} registered more than once")]
    DuplicateVault(Address),

    #[error("hybrid route {route} uses invalid pool indices i={i} j={j}")]
    InvalidPoolIndices { route: String, i: usize, j: usize },

    #[error("hybrid route {route} deposits into unregistered vault {vault:?}")]
    UnknownVault { route: String, vault: Address },
}

fn default_vault_protocol() -> String {
    protocols::ERC4626.to_string()
}

/// ERC-4626 vault the engine can zap into and out of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    /// Vault (share token) address
    pub address: Address,
    pub symbol: String,
    /// Share token decimals
    pub decimals: u8,
    /// Asset accepted by `deposit` and returned by `redeem`
    pub underlying: Address,
    #[serde(default = "default_vault_protocol")]
    pub protocol: String,
}

impl VaultEntry {
    pub fn share_token(&self) -> Token {
        Token::new(self.address, self.decimals, self.symbol.clone())
    }
}

/// Wrap-then-swap path into a vault: mint `wrapped` 1:1 from `intermediate`,
/// swap it through `pool` into `output`, deposit `output` into `vault`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridRouteEntry {
    pub name: String,
    pub intermediate: Address,
    pub wrapped: Address,
    /// Contract that mints `wrapped` from `intermediate`
    pub wrapper: Address,
    pub mint_protocol: String,
    pub pool: Address,
    pub pool_kind: CurveKind,
    /// Coin index of `wrapped` in the pool
    pub pool_i: usize,
    /// Coin index of `output` in the pool
    pub pool_j: usize,
    pub output: Address,
    pub vault: Address,
    pub swap_protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub vaults: Vec<VaultEntry>,
    #[serde(default)]
    pub hybrid_routes: Vec<HybridRouteEntry>,
}

impl Registry {
    pub fn vault(&self, address: Address) -> Option<&VaultEntry> {
        self.vaults.iter().find(|v| v.address == address)
    }

    pub fn is_vault(&self, address: Address) -> bool {
        self.vault(address).is_some()
    }

    /// Resolve any registered address (plain token or vault share) to its token data
    pub fn token(&self, address: Address) -> Option<Token> {
        self.tokens
            .iter()
            .find(|t| t.address == address)
            .cloned()
            .or_else(|| self.vault(address).map(VaultEntry::share_token))
    }

    pub fn hybrid_route(&self, name: &str) -> Option<&HybridRouteEntry> {
        self.hybrid_routes.iter().find(|r| r.name == name)
    }

    pub fn hybrid_route_for_vault(&self, vault: Address) -> Option<&HybridRouteEntry> {
        self.hybrid_routes.iter().find(|r| r.vault == vault)
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        for (idx, vault) in self.vaults.iter().enumerate() {
            if vault.address == vault.underlying {
                return Err(RegistryError::SelfUnderlying {
                    symbol: vault.symbol.clone(),
                    address: vault.address,
                });
            }
            if self.vaults[..idx].iter().any(|v| v.address == vault.address) {
                return Err(RegistryError::DuplicateVault(vault.address));
            }
        }

        for route in &self.hybrid_routes {
            if route.pool_i == route.pool_j || route.pool_i > 1 || route.pool_j > 1 {
                return Err(RegistryError::InvalidPoolIndices {
                    route: route.name.clone(),
                    i: route.pool_i,
                    j: route.pool_j,
                });
            }
            if !self.is_vault(route.vault) {
                return Err(RegistryError::UnknownVault {
                    route: route.name.clone(),
                    vault: route.vault,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault(byte: u8, underlying: u8) -> VaultEntry {
        VaultEntry {
            address: Address::repeat_byte(byte),
            symbol: format!("yv{}", byte),
            decimals: 18,
            underlying: Address::repeat_byte(underlying),
            protocol: default_vault_protocol(),
        }
    }

    #[test]
    fn test_lookup_resolves_vault_share_tokens() {
        let registry = Registry {
            tokens: vec![Token::new(Address::repeat_byte(1), 6, "USDC")],
            vaults: vec![vault(2, 1)],
            hybrid_routes: vec![],
        };

        assert_eq!(registry.token(Address::repeat_byte(1)).unwrap().symbol, "USDC");
        let share = registry.token(Address::repeat_byte(2)).unwrap();
        assert_eq!(share.symbol, "yv2");
        assert!(registry.is_vault(Address::repeat_byte(2)));
        assert!(registry.token(Address::repeat_byte(9)).is_none());
    }

    #[test]
    fn test_rejects_vault_that_is_its_own_underlying() {
        let registry = Registry {
            vaults: vec![vault(3, 3)],
            ..Default::default()
        };
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::SelfUnderlying { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicate_vaults() {
        let registry = Registry {
            vaults: vec![vault(2, 1), vault(2, 1)],
            ..Default::default()
        };
        assert_eq!(
            registry.validate(),
            Err(RegistryError::DuplicateVault(Address::repeat_byte(2)))
        );
    }

    #[test]
    fn test_hybrid_route_must_target_registered_vault() {
        let route = HybridRouteEntry {
            name: "ycrv".to_string(),
            intermediate: Address::repeat_byte(0x10),
            wrapped: Address::repeat_byte(0x11),
            wrapper: Address::repeat_byte(0x11),
            mint_protocol: "yearn".to_string(),
            pool: Address::repeat_byte(0x12),
            pool_kind: CurveKind::Stable,
            pool_i: 0,
            pool_j: 1,
            output: Address::repeat_byte(0x13),
            vault: Address::repeat_byte(0x14),
            swap_protocol: protocols::CURVE.to_string(),
        };
        let mut registry = Registry {
            hybrid_routes: vec![route.clone()],
            ..Default::default()
        };
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::UnknownVault { .. })
        ));

        registry.vaults.push(vault(0x14, 0x13));
        assert!(registry.validate().is_ok());
        assert_eq!(registry.hybrid_route_for_vault(Address::repeat_byte(0x14)), Some(&route));

        registry.hybrid_routes[0].pool_j = 0;
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::InvalidPoolIndices { .. })
        ));
    }
}

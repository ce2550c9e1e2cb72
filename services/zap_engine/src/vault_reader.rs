//! ERC-4626 preview reads
//!
//! Previews are what the vault would mint or return at the current block;
//! they back the USD valuation of share amounts and the final-output
//! estimate of hybrid bundles.

use anyhow::Result;
use async_trait::async_trait;
use types::{Address, U256};

use crate::snapshot::{call, ContractReader};

#[async_trait]
pub trait VaultReader: Send + Sync {
    /// Shares minted for `assets` of the underlying
    async fn preview_deposit(&self, vault: Address, assets: U256) -> Result<U256>;

    /// Underlying returned for `shares`
    async fn preview_redeem(&self, vault: Address, shares: U256) -> Result<U256>;

    async fn asset(&self, vault: Address) -> Result<Address>;
}

#[async_trait]
impl VaultReader for ContractReader {
    async fn preview_deposit(&self, vault: Address, assets: U256) -> Result<U256> {
        let contract = self.contract(vault, &self.vault_abi);
        call::<_, U256>(&contract, "previewDeposit", assets).await
    }

    async fn preview_redeem(&self, vault: Address, shares: U256) -> Result<U256> {
        let contract = self.contract(vault, &self.vault_abi);
        call::<_, U256>(&contract, "previewRedeem", shares).await
    }

    async fn asset(&self, vault: Address) -> Result<Address> {
        let contract = self.contract(vault, &self.vault_abi);
        call::<_, Address>(&contract, "asset", ()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires ZAP_TEST_RPC_URL pointing at mainnet
    async fn test_live_vault_previews() {
        let rpc = std::env::var("ZAP_TEST_RPC_URL").unwrap();
        let reader = ContractReader::new(&rpc, 10_000).unwrap();
        let vault: Address = "0x27B5739e22ad9033bcBf192059122d163b60349D".parse().unwrap();

        let one = U256::exp10(18);
        let shares = reader.preview_deposit(vault, one).await.unwrap();
        let assets = reader.preview_redeem(vault, shares).await.unwrap();
        // round trip loses at most rounding dust
        assert!(assets <= one);
        assert!(assets + U256::from(2u64) >= one);

        let underlying = reader.asset(vault).await.unwrap();
        assert_ne!(underlying, vault);
    }
}

//! # Preflight Simulation
//!
//! ## Purpose
//!
//! Runs a router transaction against a simulation backend before it is
//! submitted. The simulated sender is pre-funded and pre-approved through
//! storage overrides, so no real balance is needed.
//!
//! ## Storage layouts
//!
//! Balance and allowance mappings live at `keccak256` of the ABI-encoded key
//! and slot. Solidity hashes `(key, slot)`; Vyper hashes `(slot, key)`. The
//! layout must be chosen per token contract.
//!
//! ## Outcomes
//!
//! A reachable backend yields [`SimulationOutcome`], either success or a
//! revert with the decoded `Error(string)` reason. An unreachable backend
//! yields [`SimulationError::Transport`], which is retryable.

use async_trait::async_trait;
use config::SimulationConfig;
use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::{Bytes, H256};
use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use types::{Address, RouterTransaction, U256};
use url::Url;

/// `bytes4(keccak256("Error(string)"))`
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLayout {
    /// `keccak256(abi.encode(key, slot))`
    Solidity,
    /// `keccak256(abi.encode(slot, key))`
    Vyper,
}

fn mapping_slot(key: Token, slot: Token, layout: StorageLayout) -> H256 {
    let encoded = match layout {
        StorageLayout::Solidity => abi::encode(&[key, slot]),
        StorageLayout::Vyper => abi::encode(&[slot, key]),
    };
    H256::from(keccak256(encoded))
}

/// Storage slot of `balanceOf[owner]` for a mapping declared at `slot`
pub fn balance_slot(owner: Address, slot: U256, layout: StorageLayout) -> H256 {
    mapping_slot(Token::Address(owner), Token::Uint(slot), layout)
}

/// Storage slot of `allowance[owner][spender]` for a mapping declared at `slot`
pub fn allowance_slot(owner: Address, spender: Address, slot: U256, layout: StorageLayout) -> H256 {
    let outer = balance_slot(owner, slot, layout);
    mapping_slot(
        Token::Address(spender),
        Token::FixedBytes(outer.as_bytes().to_vec()),
        layout,
    )
}

fn word(value: U256) -> H256 {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    H256::from(buf)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct StorageOverride {
    storage: BTreeMap<H256, H256>,
}

/// Per-contract storage overrides applied to a simulation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StateOverrides {
    contracts: BTreeMap<Address, StorageOverride>,
}

impl StateOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw storage word
    pub fn set(mut self, contract: Address, slot: H256, value: U256) -> Self {
        self.contracts
            .entry(contract)
            .or_default()
            .storage
            .insert(slot, word(value));
        self
    }

    /// Give `owner` a `token` balance of `amount`
    pub fn fund(self, token: Address, owner: Address, balance_mapping_slot: U256, layout: StorageLayout, amount: U256) -> Self {
        self.set(token, balance_slot(owner, balance_mapping_slot, layout), amount)
    }

    /// Let `spender` move `amount` of `owner`'s `token`
    pub fn approve(
        self,
        token: Address,
        owner: Address,
        spender: Address,
        allowance_mapping_slot: U256,
        layout: StorageLayout,
        amount: U256,
    ) -> Self {
        self.set(token, allowance_slot(owner, spender, allowance_mapping_slot, layout), amount)
    }

    pub fn get(&self, contract: Address, slot: H256) -> Option<H256> {
        self.contracts.get(&contract)?.storage.get(&slot).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    Success { gas_used: U256 },
    Reverted { reason: Option<String>, gas_used: U256 },
}

impl SimulationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SimulationOutcome::Success { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// Backend unreachable or timed out
    #[error("could not reach simulation backend: {0}")]
    Transport(String),

    #[error("simulation backend error (status {status}): {body}")]
    Backend { status: u16, body: String },

    #[error("failed to decode simulation response: {0}")]
    Decode(String),

    #[error("simulation not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("quote carries no router transaction to simulate")]
    NoTransaction,
}

impl SimulationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SimulationError::Transport(_) => true,
            SimulationError::Backend { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Decode the reason string of an `Error(string)` revert payload
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    abi::decode(&[ParamType::String], &data[4..])
        .ok()?
        .into_iter()
        .next()?
        .into_string()
}

#[async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(
        &self,
        tx: &RouterTransaction,
        from: Address,
        overrides: &StateOverrides,
    ) -> Result<SimulationOutcome, SimulationError>;
}

#[derive(Serialize)]
struct SimulationRequest<'a> {
    network_id: String,
    from: Address,
    to: Address,
    input: &'a Bytes,
    value: String,
    save: bool,
    save_if_fails: bool,
    simulation_type: &'static str,
    #[serde(skip_serializing_if = "StateOverrides::is_empty")]
    state_objects: &'a StateOverrides,
}

#[derive(Debug, Deserialize)]
struct SimulationResponse {
    transaction: SimulatedTransaction,
}

#[derive(Debug, Deserialize)]
struct SimulatedTransaction {
    status: bool,
    #[serde(default)]
    gas_used: u64,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    transaction_info: Option<TransactionInfo>,
}

#[derive(Debug, Deserialize)]
struct TransactionInfo {
    #[serde(default)]
    call_trace: Option<CallTrace>,
}

#[derive(Debug, Deserialize)]
struct CallTrace {
    #[serde(default)]
    output: Option<Bytes>,
}

/// HTTP simulation backend client
pub struct SimulationClient {
    http: reqwest::Client,
    base_url: Url,
    account: Option<String>,
    project: Option<String>,
    access_key: Option<String>,
    chain_id: u64,
}

impl SimulationClient {
    pub fn new(config: &SimulationConfig, chain_id: u64, timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create simulation HTTP client")?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            http,
            base_url: Url::parse(&base).context("Invalid simulation base URL")?,
            account: config.account.clone(),
            project: config.project.clone(),
            access_key: config.access_key.clone(),
            chain_id,
        })
    }

    fn endpoint(&self) -> Result<Url, SimulationError> {
        let account = self.account.as_deref().ok_or(SimulationError::NotConfigured("account"))?;
        let project = self.project.as_deref().ok_or(SimulationError::NotConfigured("project"))?;
        self.base_url
            .join(&format!("account/{}/project/{}/simulate", account, project))
            .map_err(|e| SimulationError::Decode(format!("invalid simulation endpoint: {}", e)))
    }
}

#[async_trait]
impl Simulator for SimulationClient {
    async fn simulate(
        &self,
        tx: &RouterTransaction,
        from: Address,
        overrides: &StateOverrides,
    ) -> Result<SimulationOutcome, SimulationError> {
        let url = self.endpoint()?;
        let body = SimulationRequest {
            network_id: self.chain_id.to_string(),
            from,
            to: tx.to,
            input: &tx.data,
            value: tx.value.to_string(),
            save: false,
            save_if_fails: false,
            simulation_type: "quick",
            state_objects: overrides,
        };

        let mut request = self.http.post(url).json(&body);
        if let Some(key) = &self.access_key {
            request = request.header("X-Access-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SimulationError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SimulationError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SimulationError::Transport(e.to_string()))?;
        let parsed: SimulationResponse =
            serde_json::from_slice(&bytes).map_err(|e| SimulationError::Decode(e.to_string()))?;

        let tx = parsed.transaction;
        let gas_used = U256::from(tx.gas_used);
        if tx.status {
            crate::log_simulation!("preflight succeeded, gas used {}", gas_used);
            return Ok(SimulationOutcome::Success { gas_used });
        }

        let reason = tx
            .transaction_info
            .and_then(|info| info.call_trace)
            .and_then(|trace| trace.output)
            .and_then(|output| decode_revert_reason(&output))
            .or(tx.error_message);
        crate::log_simulation!("preflight reverted: {}", reason.as_deref().unwrap_or("unknown reason"));
        Ok(SimulationOutcome::Reverted { reason, gas_used })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h256(hex_str: &str) -> H256 {
        H256::from_slice(&hex::decode(hex_str).unwrap())
    }

    #[test]
    fn test_balance_slot_layouts() {
        let owner = Address::repeat_byte(0x11);
        let slot = U256::from(3u64);
        assert_eq!(
            balance_slot(owner, slot, StorageLayout::Solidity),
            h256("fc40ea33816453f766ebc0872d4b5152b468882abe7b6b35528069db4d6e41c4")
        );
        assert_eq!(
            balance_slot(owner, slot, StorageLayout::Vyper),
            h256("8d880ad96f277cf5638a19b870e892186320934ff5ede8fb56daeccc05010c06")
        );
    }

    #[test]
    fn test_allowance_slot_layouts() {
        let owner = Address::repeat_byte(0x11);
        let spender = Address::repeat_byte(0x22);
        let slot = U256::from(3u64);
        assert_eq!(
            allowance_slot(owner, spender, slot, StorageLayout::Solidity),
            h256("c96456ce834b6529dce91df9351452f956d10efb9c25c388a6ebf96f71229604")
        );
        assert_eq!(
            allowance_slot(owner, spender, slot, StorageLayout::Vyper),
            h256("2446467c9e6abb14c0e8b315e48d836c2ce91e1a8463227c7b5542419b19f888")
        );
    }

    #[test]
    fn test_overrides_builder_and_wire_shape() {
        let token = Address::repeat_byte(0xaa);
        let owner = Address::repeat_byte(0x11);
        let spender = Address::repeat_byte(0x22);
        let overrides = StateOverrides::new()
            .fund(token, owner, U256::from(3u64), StorageLayout::Solidity, U256::from(1_000u64))
            .approve(token, owner, spender, U256::from(4u64), StorageLayout::Solidity, U256::MAX);

        let bal = balance_slot(owner, U256::from(3u64), StorageLayout::Solidity);
        assert_eq!(overrides.get(token, bal), Some(word(U256::from(1_000u64))));

        let json = serde_json::to_value(&overrides).unwrap();
        let storage = json[format!("{:?}", token)]["storage"].as_object().unwrap();
        assert_eq!(storage.len(), 2);
        assert_eq!(
            storage[&format!("{:?}", bal)],
            serde_json::json!(format!("0x{}", "0".repeat(61) + "3e8"))
        );
    }

    #[test]
    fn test_decodes_error_string_reverts() {
        let mut payload = ERROR_STRING_SELECTOR.to_vec();
        payload.extend(abi::encode(&[Token::String("insufficient balance".to_string())]));
        assert_eq!(decode_revert_reason(&payload).as_deref(), Some("insufficient balance"));

        // custom errors and panics are not Error(string)
        assert_eq!(decode_revert_reason(&[0x4e, 0x48, 0x7b, 0x71, 0, 0]), None);
        assert_eq!(decode_revert_reason(&[]), None);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SimulationError::Transport("refused".into()).is_retryable());
        assert!(SimulationError::Backend { status: 503, body: String::new() }.is_retryable());
        assert!(!SimulationError::Backend { status: 400, body: String::new() }.is_retryable());
        assert!(!SimulationError::Decode("eof".into()).is_retryable());
        assert!(!SimulationError::NoTransaction.is_retryable());
    }
}

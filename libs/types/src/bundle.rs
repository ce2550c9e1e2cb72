//! Aggregator bundles: ordered, atomically executed action sequences
//!
//! A bundle is a linear sequence. The router executes action `k` strictly
//! after actions `0..k`, so a [`Amount::DynamicRef`] may only point backward.
//! Several actions may consume the same earlier output (fan-out).

use ethers_core::types::{Address, U256};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::amount::{opt_u256_dec, u256_dec, Amount};
use crate::errors::BundleError;

/// Longest reference chain the router's quote simulation models reliably.
/// Deeper chains must ship a caller-supplied final output estimate.
pub const MAX_SIMULATED_REFERENCE_DEPTH: usize = 2;

/// Action kinds understood by the aggregator router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Route,
    Mint,
    Exchange,
    Deposit,
    Redeem,
    Approve,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Route => "route",
            ActionKind::Mint => "mint",
            ActionKind::Exchange => "exchange",
            ActionKind::Deposit => "deposit",
            ActionKind::Redeem => "redeem",
            ActionKind::Approve => "approve",
        };
        f.write_str(name)
    }
}

fn bps_string<S: Serializer>(bps: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&bps.to_string())
}

/// Aggregator-routed swap, path chosen by the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteArgs {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: Amount,
    #[serde(rename = "slippage", serialize_with = "bps_string")]
    pub slippage_bps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Address>,
}

/// 1:1 wrap of `token_in` into `token_out` through `primary_address`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintArgs {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: Amount,
    pub primary_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Address>,
}

/// Direct AMM pool exchange. `min_amount_out` has no dynamic form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeArgs {
    pub pool: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: Amount,
    #[serde(with = "u256_dec")]
    pub min_amount_out: U256,
}

/// Vault deposit (`token_out` is the share token)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositArgs {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: Amount,
    pub primary_address: Address,
}

/// Vault redemption (`token_in` is the share token)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemArgs {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: Amount,
    pub primary_address: Address,
}

/// ERC-20 allowance grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveArgs {
    pub token: Address,
    pub spender: Address,
    pub amount: Amount,
}

/// Per-kind arguments. The variant determines the action kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionArgs {
    Route(RouteArgs),
    Mint(MintArgs),
    Exchange(ExchangeArgs),
    Deposit(DepositArgs),
    Redeem(RedeemArgs),
    Approve(ApproveArgs),
}

impl ActionArgs {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionArgs::Route(_) => ActionKind::Route,
            ActionArgs::Mint(_) => ActionKind::Mint,
            ActionArgs::Exchange(_) => ActionKind::Exchange,
            ActionArgs::Deposit(_) => ActionKind::Deposit,
            ActionArgs::Redeem(_) => ActionKind::Redeem,
            ActionArgs::Approve(_) => ActionKind::Approve,
        }
    }

    /// The amount this action consumes
    pub fn amount(&self) -> Amount {
        match self {
            ActionArgs::Route(a) => a.amount_in,
            ActionArgs::Mint(a) => a.amount_in,
            ActionArgs::Exchange(a) => a.amount_in,
            ActionArgs::Deposit(a) => a.amount_in,
            ActionArgs::Redeem(a) => a.amount_in,
            ActionArgs::Approve(a) => a.amount,
        }
    }
}

/// One step of a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleAction {
    /// Protocol identifier understood by the router (e.g. "enso", "curve", "erc4626")
    pub protocol: String,
    pub args: ActionArgs,
}

impl BundleAction {
    pub fn new(protocol: impl Into<String>, args: ActionArgs) -> Self {
        Self {
            protocol: protocol.into(),
            args,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.args.kind()
    }

    pub fn amount(&self) -> Amount {
        self.args.amount()
    }
}

impl Serialize for BundleAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BundleAction", 3)?;
        state.serialize_field("protocol", &self.protocol)?;
        state.serialize_field("action", &self.kind())?;
        match &self.args {
            ActionArgs::Route(args) => state.serialize_field("args", args)?,
            ActionArgs::Mint(args) => state.serialize_field("args", args)?,
            ActionArgs::Exchange(args) => state.serialize_field("args", args)?,
            ActionArgs::Deposit(args) => state.serialize_field("args", args)?,
            ActionArgs::Redeem(args) => state.serialize_field("args", args)?,
            ActionArgs::Approve(args) => state.serialize_field("args", args)?,
        }
        state.end()
    }
}

/// Validated, ordered action sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    actions: Vec<BundleAction>,
    #[serde(with = "opt_u256_dec", skip_serializing_if = "Option::is_none")]
    final_output_estimate: Option<U256>,
}

impl Bundle {
    /// Build a bundle, rejecting empty sequences and non-backward references
    pub fn new(actions: Vec<BundleAction>) -> Result<Self, BundleError> {
        Self::validate(&actions)?;
        Ok(Self {
            actions,
            final_output_estimate: None,
        })
    }

    /// Single validation pass over the action list
    pub fn validate(actions: &[BundleAction]) -> Result<(), BundleError> {
        if actions.is_empty() {
            return Err(BundleError::EmptyBundle);
        }
        for (index, action) in actions.iter().enumerate() {
            if let Some(reference) = action.amount().reference() {
                if reference >= index {
                    return Err(BundleError::ForwardReference {
                        action: index,
                        reference,
                    });
                }
            }
        }
        Ok(())
    }

    /// Attach the precomputed final output handed to the router when it is
    /// told to skip its own quote pass
    pub fn with_output_estimate(mut self, estimate: U256) -> Self {
        self.final_output_estimate = Some(estimate);
        self
    }

    pub fn actions(&self) -> &[BundleAction] {
        &self.actions
    }

    pub fn get(&self, index: usize) -> Option<&BundleAction> {
        self.actions.get(index)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn final_output_estimate(&self) -> Option<U256> {
        self.final_output_estimate
    }

    /// Indices of the actions that consume the output of `index`
    pub fn consumers_of(&self, index: usize) -> Vec<usize> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, action)| action.amount().reference() == Some(index))
            .map(|(i, _)| i)
            .collect()
    }

    /// Length of the longest chain of dynamic references
    pub fn reference_depth(&self) -> usize {
        let mut depth = vec![0usize; self.actions.len()];
        for (index, action) in self.actions.iter().enumerate() {
            if let Some(reference) = action.amount().reference() {
                depth[index] = depth[reference] + 1;
            }
        }
        depth.into_iter().max().unwrap_or(0)
    }

    pub fn requires_output_estimate(&self) -> bool {
        self.reference_depth() > MAX_SIMULATED_REFERENCE_DEPTH
    }

    /// Check the bundle can be handed to the router as-is
    pub fn ensure_executable(&self) -> Result<(), BundleError> {
        if self.requires_output_estimate() && self.final_output_estimate.is_none() {
            return Err(BundleError::MissingOutputEstimate {
                depth: self.reference_depth(),
            });
        }
        Ok(())
    }
}

//! # Bundle Composer - Zap Action Templates
//!
//! ## Purpose
//!
//! Pure, synchronous construction of the ordered action list the aggregator
//! router executes atomically. Each action's amount is either a literal or a
//! reference to an earlier action's on-chain output, so the bundle stays
//! correct when the router's actual path produces a different amount than
//! any off-chain estimate.
//!
//! ## Templates
//!
//! ```text
//! zap-in          route(in→underlying) → deposit(Ref 0)
//! zap-out         redeem(Lit shares) → route(underlying→out, Ref 0)
//! vault-to-vault  redeem(Lit shares) → [route(Ref 0)] → deposit(Ref prev)
//! hybrid          [route(in→intermediate)] → approve → mint → approve
//!                 → exchange → approve(Ref ex) → deposit(Ref ex)
//! ```
//!
//! Validation runs before any action is built: a vault-to-vault zap whose
//! source and target are the same vault fails with [`BundleError::SelfZap`].

use config::service::protocols;
use config::{HybridRouteEntry, VaultEntry};
use types::{
    ActionArgs, Address, Amount, ApproveArgs, Bundle, BundleAction, BundleError, DepositArgs,
    ExchangeArgs, MintArgs, RedeemArgs, RouteArgs, U256,
};

use crate::slippage::apply_slippage;

/// Token → vault shares
#[derive(Debug, Clone)]
pub struct ZapInRequest {
    pub token_in: Address,
    pub vault: VaultEntry,
    pub amount: U256,
    pub slippage_bps: u32,
}

/// Vault shares → token
#[derive(Debug, Clone)]
pub struct ZapOutRequest {
    pub vault: VaultEntry,
    pub token_out: Address,
    pub shares: U256,
    pub slippage_bps: u32,
}

/// Shares of one vault → shares of another
#[derive(Debug, Clone)]
pub struct VaultToVaultRequest {
    pub source: VaultEntry,
    pub target: VaultEntry,
    pub shares: U256,
    pub slippage_bps: u32,
}

/// Token → (route) → intermediate → mint wrapped → pool swap → vault shares
#[derive(Debug, Clone)]
pub struct HybridRequest {
    pub token_in: Address,
    pub route: HybridRouteEntry,
    pub vault: VaultEntry,
    pub amount: U256,
    pub slippage_bps: u32,
    /// Advisory pool output, used only for the exchange's minimum-out literal
    pub expected_swap_output: U256,
    /// Advisory vault shares, attached when the router cannot simulate the chain
    pub expected_output: U256,
}

fn route(token_in: Address, token_out: Address, amount_in: Amount, slippage_bps: u32) -> BundleAction {
    BundleAction::new(
        protocols::ROUTE,
        ActionArgs::Route(RouteArgs {
            token_in,
            token_out,
            amount_in,
            slippage_bps,
            receiver: None,
        }),
    )
}

fn deposit(vault: &VaultEntry, amount_in: Amount) -> BundleAction {
    BundleAction::new(
        vault.protocol.clone(),
        ActionArgs::Deposit(DepositArgs {
            token_in: vault.underlying,
            token_out: vault.address,
            amount_in,
            primary_address: vault.address,
        }),
    )
}

fn redeem(vault: &VaultEntry, amount_in: Amount) -> BundleAction {
    BundleAction::new(
        vault.protocol.clone(),
        ActionArgs::Redeem(RedeemArgs {
            token_in: vault.address,
            token_out: vault.underlying,
            amount_in,
            primary_address: vault.address,
        }),
    )
}

fn approve(token: Address, spender: Address, amount: Amount) -> BundleAction {
    BundleAction::new(
        protocols::ERC20,
        ActionArgs::Approve(ApproveArgs {
            token,
            spender,
            amount,
        }),
    )
}

fn non_zero(amount: U256) -> Result<(), BundleError> {
    if amount.is_zero() {
        return Err(BundleError::ZeroAmount);
    }
    Ok(())
}

pub fn compose_zap_in(request: &ZapInRequest) -> Result<Bundle, BundleError> {
    let vault = &request.vault;
    if request.token_in == vault.address {
        return Err(BundleError::UnsupportedPair {
            token_in: request.token_in,
            token_out: vault.address,
        });
    }
    non_zero(request.amount)?;

    // The route leg stays even when the input already is the underlying;
    // the router passes a same-token route straight through
    Bundle::new(vec![
        route(
            request.token_in,
            vault.underlying,
            Amount::Literal(request.amount),
            request.slippage_bps,
        ),
        deposit(vault, Amount::DynamicRef(0)),
    ])
}

pub fn compose_zap_out(request: &ZapOutRequest) -> Result<Bundle, BundleError> {
    let vault = &request.vault;
    if request.token_out == vault.address {
        return Err(BundleError::UnsupportedPair {
            token_in: vault.address,
            token_out: request.token_out,
        });
    }
    non_zero(request.shares)?;

    Bundle::new(vec![
        redeem(vault, Amount::Literal(request.shares)),
        route(
            vault.underlying,
            request.token_out,
            Amount::DynamicRef(0),
            request.slippage_bps,
        ),
    ])
}

pub fn compose_vault_to_vault(request: &VaultToVaultRequest) -> Result<Bundle, BundleError> {
    let (source, target) = (&request.source, &request.target);
    if source.address == target.address {
        return Err(BundleError::SelfZap {
            vault: source.address,
        });
    }
    non_zero(request.shares)?;

    let mut actions = vec![redeem(source, Amount::Literal(request.shares))];
    if source.underlying != target.underlying {
        actions.push(route(
            source.underlying,
            target.underlying,
            Amount::DynamicRef(0),
            request.slippage_bps,
        ));
    }
    let last = actions.len() - 1;
    actions.push(deposit(target, Amount::DynamicRef(last)));
    Bundle::new(actions)
}

pub fn compose_hybrid(request: &HybridRequest) -> Result<Bundle, BundleError> {
    let (path, vault) = (&request.route, &request.vault);
    if path.vault != vault.address || request.token_in == vault.address {
        return Err(BundleError::UnsupportedPair {
            token_in: request.token_in,
            token_out: vault.address,
        });
    }
    non_zero(request.amount)?;

    let min_amount_out = apply_slippage(request.expected_swap_output, request.slippage_bps);
    let mut actions = Vec::with_capacity(7);

    // Amount fed into the mint, and the allowance granted ahead of it
    let (mint_amount, mint_allowance) = if request.token_in == path.intermediate {
        (Amount::Literal(request.amount), Amount::max())
    } else {
        actions.push(route(
            request.token_in,
            path.intermediate,
            Amount::Literal(request.amount),
            request.slippage_bps,
        ));
        (Amount::DynamicRef(0), Amount::DynamicRef(0))
    };

    actions.push(approve(path.intermediate, path.wrapper, mint_allowance));
    let mint_index = actions.len();
    actions.push(BundleAction::new(
        path.mint_protocol.clone(),
        ActionArgs::Mint(MintArgs {
            token_in: path.intermediate,
            token_out: path.wrapped,
            amount_in: mint_amount,
            primary_address: path.wrapper,
            receiver: None,
        }),
    ));

    // Wrapping is 1:1, so a literal mint input is also the literal swap input
    let (swap_amount, swap_allowance) = if mint_amount.is_dynamic() {
        (Amount::DynamicRef(mint_index), Amount::DynamicRef(mint_index))
    } else {
        (mint_amount, Amount::max())
    };

    actions.push(approve(path.wrapped, path.pool, swap_allowance));
    let exchange_index = actions.len();
    actions.push(BundleAction::new(
        path.swap_protocol.clone(),
        ActionArgs::Exchange(ExchangeArgs {
            pool: path.pool,
            token_in: path.wrapped,
            token_out: path.output,
            amount_in: swap_amount,
            min_amount_out,
        }),
    ));

    // Both the allowance and the deposit consume the exchange output
    actions.push(approve(path.output, vault.address, Amount::DynamicRef(exchange_index)));
    actions.push(deposit(vault, Amount::DynamicRef(exchange_index)));

    let bundle = Bundle::new(actions)?;
    if bundle.requires_output_estimate() {
        let bundle = bundle.with_output_estimate(request.expected_output);
        bundle.ensure_executable()?;
        return Ok(bundle);
    }
    Ok(bundle)
}

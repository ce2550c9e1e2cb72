//! # Zap Service - Quote Orchestration
//!
//! ## Purpose
//!
//! Wires the registry, contract readers, router and price feed into the four
//! zap quote flows. Composition problems (self-zap, unsupported pair, zero
//! amount) are returned as [`BundleError`] before any network call where
//! possible. Network, price and math failures after that point are logged
//! and surface as `Ok(None)`; they are never turned into a zero amount.
//!
//! ## Concurrency
//!
//! Independent reads of one request run concurrently under a single
//! per-request timeout. Requests share no mutable state apart from the
//! injected price cache, so dropping a pending quote leaves nothing behind.

use anyhow::Context;
use config::{HybridRouteEntry, Registry, VaultEntry, ZapConfig};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::{Address, Bundle, BundleError, HybridBreakdown, Token, ZapFlow, ZapQuote, U256};
use zap_amm::SwapCurve;

use crate::composer::{
    compose_hybrid, compose_vault_to_vault, compose_zap_in, compose_zap_out, HybridRequest,
    VaultToVaultRequest, ZapInRequest, ZapOutRequest,
};
use crate::estimator::QuoteEstimator;
use crate::price_feed::{CachedPriceSource, PriceCache, PriceSource, RouterPriceSource};
use crate::resolver::{RequestParams, RouterRequest};
use crate::router_client::{AggregatorRouter, RouterClient};
use crate::simulation::{
    SimulationClient, SimulationError, SimulationOutcome, Simulator, StateOverrides,
};
use crate::snapshot::{ContractReader, PoolReader};
use crate::vault_reader::VaultReader;
use crate::{log_bundle, log_quote, log_quote_dropped};

/// Decimals assumed for pool coins missing from the token registry
const DEFAULT_DECIMALS: u8 = 18;

pub struct ZapService {
    config: ZapConfig,
    pools: Arc<dyn PoolReader>,
    vaults: Arc<dyn VaultReader>,
    router: Arc<dyn AggregatorRouter>,
    prices: Arc<dyn PriceSource>,
    simulator: Option<Arc<dyn Simulator>>,
}

impl ZapService {
    pub fn new(
        config: ZapConfig,
        pools: Arc<dyn PoolReader>,
        vaults: Arc<dyn VaultReader>,
        router: Arc<dyn AggregatorRouter>,
        prices: Arc<dyn PriceSource>,
    ) -> Self {
        Self {
            config,
            pools,
            vaults,
            router,
            prices,
            simulator: None,
        }
    }

    pub fn with_simulator(mut self, simulator: Arc<dyn Simulator>) -> Self {
        self.simulator = Some(simulator);
        self
    }

    /// Production wiring: ethers contract reads, HTTP router, cached router prices
    pub fn from_config(config: ZapConfig) -> anyhow::Result<Self> {
        let reader = Arc::new(
            ContractReader::new(&config.network.rpc_url, config.network.request_timeout_ms)
                .context("Failed to create contract reader")?,
        );

        let limiter = RouterClient::rate_limiter(config.router.rate_limit_per_sec);
        let router = Arc::new(
            RouterClient::new(&config.router, config.network.chain_id, limiter)
                .context("Failed to create router client")?,
        );

        let cache = Arc::new(PriceCache::new(Duration::from_secs(
            config.quote.price_cache_ttl_secs,
        )));
        let prices = Arc::new(CachedPriceSource::new(
            Arc::new(RouterPriceSource::new(router.clone())),
            cache,
        ));

        let simulator = Arc::new(
            SimulationClient::new(
                &config.simulation,
                config.network.chain_id,
                Duration::from_millis(config.quote.timeout_ms),
            )
            .context("Failed to create simulation client")?,
        );

        Ok(Self::new(config, reader.clone(), reader, router, prices).with_simulator(simulator))
    }

    pub fn registry(&self) -> &Registry {
        &self.config.registry
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.quote.timeout_ms)
    }

    fn request_params(&self, from: Address) -> RequestParams {
        RequestParams {
            chain_id: self.config.network.chain_id,
            from_address: from,
            receiver: None,
            routing_strategy: self.config.router.routing_strategy.clone(),
        }
    }

    fn slippage_bps(&self) -> u32 {
        self.config.quote.default_slippage_bps
    }

    fn vault_entry(&self, vault: Address, counterpart: Address) -> Result<VaultEntry, BundleError> {
        self.registry()
            .vault(vault)
            .cloned()
            .ok_or(BundleError::UnsupportedPair {
                token_in: counterpart,
                token_out: vault,
            })
    }

    /// A registered plain token; vault shares are only valid on the vault side of a flow
    fn plain_token(&self, token: Address, counterpart: Address) -> Result<Token, BundleError> {
        let registry = self.registry();
        match registry.token(token) {
            Some(found) if !registry.is_vault(token) => Ok(found),
            _ => Err(BundleError::UnsupportedPair {
                token_in: token,
                token_out: counterpart,
            }),
        }
    }

    fn decimals_of(&self, token: Address) -> u8 {
        self.registry()
            .token(token)
            .map(|t| t.decimals)
            .unwrap_or(DEFAULT_DECIMALS)
    }

    /// Run `future` under the per-request timeout, logging a drop on expiry
    async fn within_timeout<F: Future>(&self, flow: ZapFlow, future: F) -> Option<F::Output> {
        match tokio::time::timeout(self.timeout(), future).await {
            Ok(output) => Some(output),
            Err(_) => {
                log_quote_dropped!("{} quote timed out after {:?}", flow, self.timeout());
                None
            }
        }
    }

    /// USD value of `amount` of `token`; vault shares are valued through their underlying
    async fn usd_of(&self, token: &Token, amount: U256) -> Option<Decimal> {
        let (priced_token, priced_amount, decimals) = match self.registry().vault(token.address) {
            Some(vault) => {
                let assets = match self.vaults.preview_redeem(vault.address, amount).await {
                    Ok(assets) => assets,
                    Err(e) => {
                        debug!("previewRedeem failed for {:?}: {:#}", vault.address, e);
                        return None;
                    }
                };
                (vault.underlying, assets, self.decimals_of(vault.underlying))
            }
            None => (token.address, amount, token.decimals),
        };

        match self.prices.usd_price(priced_token).await {
            Ok(price) => QuoteEstimator::usd_value(priced_amount, decimals, price),
            Err(e) => {
                debug!("No USD price for {:?}: {:#}", priced_token, e);
                None
            }
        }
    }

    /// Send a composed bundle to the router and assemble the quote
    #[allow(clippy::too_many_arguments)]
    async fn routed_quote(
        &self,
        flow: ZapFlow,
        token_in: Token,
        token_out: Token,
        amount_in: U256,
        bundle: Bundle,
        from: Address,
        hybrid: Option<HybridBreakdown>,
    ) -> Result<Option<ZapQuote>, BundleError> {
        let request = RouterRequest::from_bundle(&bundle, &self.request_params(from))?;
        log_bundle!("{} bundle: {} actions, depth {}", flow, bundle.len(), bundle.reference_depth());

        let Some((response, usd_in)) = self
            .within_timeout(flow, async {
                tokio::join!(self.router.bundle(&request), self.usd_of(&token_in, amount_in))
            })
            .await
        else {
            return Ok(None);
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                log_quote_dropped!("{} router bundle failed (retryable: {}): {}", flow, e.is_retryable(), e);
                return Ok(None);
            }
        };

        // With skipQuote the router echoes no amounts; fall back to our own estimate
        let estimated_output = match response
            .amounts_out
            .get(&token_out.address)
            .copied()
            .or(bundle.final_output_estimate())
        {
            Some(amount) => amount,
            None => {
                log_quote_dropped!("{} router returned no output for {:?}", flow, token_out.address);
                return Ok(None);
            }
        };

        let usd_out = self
            .within_timeout(flow, self.usd_of(&token_out, estimated_output))
            .await
            .flatten();
        let price_impact = match (usd_in, usd_out) {
            (Some(input), Some(output)) => QuoteEstimator::price_impact(input, output),
            _ => None,
        };

        let quote = ZapQuote {
            flow,
            exchange_rate: QuoteEstimator::exchange_rate(
                amount_in,
                token_in.decimals,
                estimated_output,
                token_out.decimals,
            ),
            token_in,
            token_out,
            amount_in,
            estimated_output,
            price_impact,
            gas_estimate: Some(response.gas),
            bundle,
            hybrid,
            transaction: Some(response.tx),
        };
        log_quote!(
            "{} {} {} -> {} {}",
            flow,
            quote.amount_in,
            quote.token_in.symbol,
            quote.estimated_output,
            quote.token_out.symbol
        );
        Ok(Some(quote))
    }

    /// Token → vault shares
    pub async fn quote_zap_in(
        &self,
        token_in: Address,
        vault: Address,
        amount: U256,
        from: Address,
    ) -> Result<Option<ZapQuote>, BundleError> {
        let vault = self.vault_entry(vault, token_in)?;
        let token = self.plain_token(token_in, vault.address)?;

        let bundle = compose_zap_in(&ZapInRequest {
            token_in,
            vault: vault.clone(),
            amount,
            slippage_bps: self.slippage_bps(),
        })?;

        self.routed_quote(ZapFlow::ZapIn, token, vault.share_token(), amount, bundle, from, None)
            .await
    }

    /// Vault shares → token
    pub async fn quote_zap_out(
        &self,
        vault: Address,
        token_out: Address,
        shares: U256,
        from: Address,
    ) -> Result<Option<ZapQuote>, BundleError> {
        let vault = self.vault_entry(vault, token_out)?;
        let token = self.plain_token(token_out, vault.address)?;

        let bundle = compose_zap_out(&ZapOutRequest {
            vault: vault.clone(),
            token_out,
            shares,
            slippage_bps: self.slippage_bps(),
        })?;

        self.routed_quote(ZapFlow::ZapOut, vault.share_token(), token, shares, bundle, from, None)
            .await
    }

    /// Shares of `source` → shares of `target`
    pub async fn quote_vault_to_vault(
        &self,
        source: Address,
        target: Address,
        shares: U256,
        from: Address,
    ) -> Result<Option<ZapQuote>, BundleError> {
        if source == target {
            return Err(BundleError::SelfZap { vault: source });
        }
        let source = self.vault_entry(source, target)?;
        let target = self.vault_entry(target, source.address)?;

        let bundle = compose_vault_to_vault(&VaultToVaultRequest {
            source: source.clone(),
            target: target.clone(),
            shares,
            slippage_bps: self.slippage_bps(),
        })?;

        self.routed_quote(
            ZapFlow::VaultToVault,
            source.share_token(),
            target.share_token(),
            shares,
            bundle,
            from,
            None,
        )
        .await
    }

    /// Token → wrap+swap route → vault shares
    pub async fn quote_hybrid(
        &self,
        token_in: Address,
        vault: Address,
        amount: U256,
        from: Address,
    ) -> Result<Option<ZapQuote>, BundleError> {
        let vault_entry = self.vault_entry(vault, token_in)?;
        let route = self
            .registry()
            .hybrid_route_for_vault(vault)
            .cloned()
            .ok_or(BundleError::UnsupportedPair {
                token_in,
                token_out: vault,
            })?;
        let token = self.plain_token(token_in, vault)?;
        if amount.is_zero() {
            return Err(BundleError::ZeroAmount);
        }

        let flow = ZapFlow::Hybrid;
        let input_is_intermediate = token_in == route.intermediate;

        let Some((mint_amount, snapshot)) = self
            .within_timeout(flow, async {
                tokio::join!(
                    self.intermediate_amount(&route, token_in, amount, from),
                    self.pools.snapshot(route.pool, route.pool_kind, self.pool_decimals(&route)),
                )
            })
            .await
        else {
            return Ok(None);
        };

        let Some(mint_amount) = mint_amount else {
            return Ok(None);
        };
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log_quote_dropped!("{} pool read failed for {:?}: {:#}", flow, route.pool, e);
                return Ok(None);
            }
        };

        let estimate = match QuoteEstimator::estimate_hybrid(mint_amount, input_is_intermediate, &snapshot, &route) {
            Ok(estimate) => estimate,
            Err(e) => {
                log_quote_dropped!("{} {} estimate failed: {}", flow, snapshot.kind(), e);
                return Ok(None);
            }
        };

        let expected_output = match self
            .within_timeout(flow, self.vaults.preview_deposit(vault, estimate.swap_output))
            .await
        {
            Some(Ok(shares)) => shares,
            Some(Err(e)) => {
                log_quote_dropped!("{} previewDeposit failed for {:?}: {:#}", flow, vault, e);
                return Ok(None);
            }
            None => return Ok(None),
        };

        let bundle = compose_hybrid(&HybridRequest {
            token_in,
            route,
            vault: vault_entry.clone(),
            amount,
            slippage_bps: self.slippage_bps(),
            expected_swap_output: estimate.swap_output,
            expected_output,
        })?;

        self.routed_quote(
            flow,
            token,
            vault_entry.share_token(),
            amount,
            bundle,
            from,
            Some(estimate.breakdown),
        )
        .await
    }

    fn pool_decimals(&self, route: &HybridRouteEntry) -> [u8; 2] {
        let mut decimals = [DEFAULT_DECIMALS; 2];
        if let Some(slot) = decimals.get_mut(route.pool_i) {
            *slot = self.decimals_of(route.wrapped);
        }
        if let Some(slot) = decimals.get_mut(route.pool_j) {
            *slot = self.decimals_of(route.output);
        }
        decimals
    }

    /// Intermediate tokens the mint step will receive
    async fn intermediate_amount(
        &self,
        route: &HybridRouteEntry,
        token_in: Address,
        amount: U256,
        from: Address,
    ) -> Option<U256> {
        if token_in == route.intermediate {
            return Some(amount);
        }
        match self
            .router
            .route_quote(token_in, route.intermediate, amount, from)
            .await
        {
            Ok(quote) => Some(quote.amount_out),
            Err(e) => {
                log_quote_dropped!("hybrid route quote {:?} -> {:?} failed: {}", token_in, route.intermediate, e);
                None
            }
        }
    }

    /// Simulate the quote's router transaction from `from` with `overrides` applied
    pub async fn preflight(
        &self,
        quote: &ZapQuote,
        from: Address,
        overrides: &StateOverrides,
    ) -> Result<SimulationOutcome, SimulationError> {
        let simulator = self
            .simulator
            .as_ref()
            .ok_or(SimulationError::NotConfigured("simulator"))?;
        let tx = quote
            .transaction
            .as_ref()
            .ok_or(SimulationError::NoTransaction)?;
        simulator.simulate(tx, from, overrides).await
    }
}


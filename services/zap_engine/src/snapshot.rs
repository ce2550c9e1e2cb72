//! # Pool Snapshot Reader
//!
//! ## Purpose
//!
//! Captures the state of one AMM pool per quote request through single-call
//! contract reads, issued concurrently. Snapshots are never cached across
//! requests since pool state changes every block.
//!
//! ## Integration Points
//!
//! - **Input**: pool address, invariant family and coin decimals from the registry
//! - **Output**: [`StableSwapSnapshot`] / [`CryptoSwapSnapshot`] for the quote estimator
//! - **Fallbacks**: pools whose `offpeg_fee_multiplier()` reverts get a static
//!   fee (multiplier = `FEE_DENOMINATOR`); pools whose `stored_rates()` reverts
//!   get rates derived from token decimals. Transport and RPC failures are
//!   never replaced by a fallback.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ethers::abi::{parse_abi, Abi, Detokenize, Tokenize};
use ethers::contract::{Contract, ContractError};
use ethers::providers::{Http, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::{Address, U256};
use url::Url;
use zap_amm::stableswap::{rate_for_decimals, FEE_DENOMINATOR};
use zap_amm::{CryptoSwapSnapshot, CurveKind, PoolSnapshot, StableSwapSnapshot};

/// Pool state reads the quote estimator depends on
#[async_trait]
pub trait PoolReader: Send + Sync {
    async fn stable_snapshot(&self, pool: Address, decimals: [u8; 2]) -> Result<StableSwapSnapshot>;

    async fn crypto_snapshot(&self, pool: Address, decimals: [u8; 2]) -> Result<CryptoSwapSnapshot>;

    async fn snapshot(&self, pool: Address, kind: CurveKind, decimals: [u8; 2]) -> Result<PoolSnapshot> {
        Ok(match kind {
            CurveKind::Stable => self.stable_snapshot(pool, decimals).await?.into(),
            CurveKind::Crypto => self.crypto_snapshot(pool, decimals).await?.into(),
        })
    }
}

const STABLESWAP_ABI: &[&str] = &[
    "function balances(uint256) external view returns (uint256)",
    "function A() external view returns (uint256)",
    "function fee() external view returns (uint256)",
    "function offpeg_fee_multiplier() external view returns (uint256)",
    "function stored_rates() external view returns (uint256[])",
];

const CRYPTOSWAP_ABI: &[&str] = &[
    "function balances(uint256) external view returns (uint256)",
    "function A() external view returns (uint256)",
    "function gamma() external view returns (uint256)",
    "function D() external view returns (uint256)",
    "function price_scale() external view returns (uint256)",
    "function mid_fee() external view returns (uint256)",
    "function out_fee() external view returns (uint256)",
    "function fee_gamma() external view returns (uint256)",
];

const ERC4626_ABI: &[&str] = &[
    "function previewDeposit(uint256 assets) external view returns (uint256)",
    "function previewRedeem(uint256 shares) external view returns (uint256)",
    "function asset() external view returns (address)",
];

/// Contract reader over a single HTTP JSON-RPC endpoint
pub struct ContractReader {
    provider: Arc<Provider<Http>>,
    stable_abi: Abi,
    crypto_abi: Abi,
    pub(crate) vault_abi: Abi,
}

impl ContractReader {
    pub fn new(rpc_url: &str, request_timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client for contract reads")?;

        let url: Url = rpc_url.parse().context("Invalid RPC URL")?;
        let provider = Provider::<Http>::new(Http::new_with_client(url, client));

        Ok(Self {
            provider: Arc::new(provider),
            stable_abi: parse_abi(STABLESWAP_ABI).context("Invalid StableSwap ABI")?,
            crypto_abi: parse_abi(CRYPTOSWAP_ABI).context("Invalid CryptoSwap ABI")?,
            vault_abi: parse_abi(ERC4626_ABI).context("Invalid ERC-4626 ABI")?,
        })
    }

    pub(crate) fn contract(&self, address: Address, abi: &Abi) -> Contract<Provider<Http>> {
        Contract::new(address, abi.clone(), self.provider.clone())
    }
}

/// One view call, decoded
pub(crate) async fn call<T, D>(contract: &Contract<Provider<Http>>, name: &str, args: T) -> Result<D>
where
    T: Tokenize + Send,
    D: Detokenize + Send,
{
    contract
        .method::<T, D>(name, args)
        .with_context(|| format!("{} is not in the ABI", name))?
        .call()
        .await
        .with_context(|| format!("{}() failed on {:?}", name, contract.address()))
}

/// View call that older pool versions do not implement; `None` only when the call reverts
pub(crate) async fn optional_call<T, D>(
    contract: &Contract<Provider<Http>>,
    name: &str,
    args: T,
) -> Result<Option<D>>
where
    T: Tokenize + Send,
    D: Detokenize + Send,
{
    let method = contract
        .method::<T, D>(name, args)
        .with_context(|| format!("{} is not in the ABI", name))?;

    match method.call().await {
        Ok(value) => Ok(Some(value)),
        Err(ContractError::Revert(_)) => {
            debug!("{}() reverted on {:?}, using fallback", name, contract.address());
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("{}() failed on {:?}", name, contract.address())),
    }
}

fn precision_for_decimals(decimals: u8) -> Result<U256> {
    if decimals > 18 {
        bail!("tokens with {} decimals are not supported", decimals);
    }
    Ok(U256::exp10(18 - decimals as usize))
}

#[async_trait]
impl PoolReader for ContractReader {
    async fn stable_snapshot(&self, pool: Address, decimals: [u8; 2]) -> Result<StableSwapSnapshot> {
        let contract = self.contract(pool, &self.stable_abi);

        let (balance0, balance1, a, fee, offpeg, stored_rates) = tokio::join!(
            call::<_, U256>(&contract, "balances", U256::zero()),
            call::<_, U256>(&contract, "balances", U256::one()),
            call::<_, U256>(&contract, "A", ()),
            call::<_, U256>(&contract, "fee", ()),
            optional_call::<_, U256>(&contract, "offpeg_fee_multiplier", ()),
            optional_call::<_, Vec<U256>>(&contract, "stored_rates", ()),
        );

        let offpeg = offpeg?.unwrap_or_else(|| U256::from(FEE_DENOMINATOR));
        let rates = match stored_rates? {
            Some(rates) if rates.len() >= 2 => [rates[0], rates[1]],
            _ => [rate_for_decimals(decimals[0]), rate_for_decimals(decimals[1])],
        };

        let snapshot = StableSwapSnapshot::from_balances([balance0?, balance1?], rates, a?, fee?, offpeg)
            .context("Failed to normalise pool balances")?;
        crate::log_pool!("stableswap {:?}: xp={:?} A={}", pool, snapshot.xp, snapshot.a);
        Ok(snapshot)
    }

    async fn crypto_snapshot(&self, pool: Address, decimals: [u8; 2]) -> Result<CryptoSwapSnapshot> {
        let contract = self.contract(pool, &self.crypto_abi);
        let precisions = [precision_for_decimals(decimals[0])?, precision_for_decimals(decimals[1])?];

        let (balance0, balance1, ann, gamma, d, price_scale, mid_fee, out_fee, fee_gamma) = tokio::try_join!(
            call::<_, U256>(&contract, "balances", U256::zero()),
            call::<_, U256>(&contract, "balances", U256::one()),
            call::<_, U256>(&contract, "A", ()),
            call::<_, U256>(&contract, "gamma", ()),
            call::<_, U256>(&contract, "D", ()),
            call::<_, U256>(&contract, "price_scale", ()),
            call::<_, U256>(&contract, "mid_fee", ()),
            call::<_, U256>(&contract, "out_fee", ()),
            call::<_, U256>(&contract, "fee_gamma", ()),
        )?;

        crate::log_pool!("cryptoswap {:?}: balances=[{}, {}] price_scale={}", pool, balance0, balance1, price_scale);
        Ok(CryptoSwapSnapshot {
            balances: [balance0, balance1],
            precisions,
            price_scale,
            ann,
            gamma,
            d,
            mid_fee,
            out_fee,
            fee_gamma,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_builds_without_network() {
        let reader = ContractReader::new("http://127.0.0.1:8545", 1_000).unwrap();
        assert!(reader.stable_abi.function("offpeg_fee_multiplier").is_ok());
        assert!(reader.crypto_abi.function("price_scale").is_ok());
        assert!(reader.vault_abi.function("previewRedeem").is_ok());
    }

    #[test]
    fn test_rejects_bad_rpc_url() {
        assert!(ContractReader::new("not a url", 1_000).is_err());
    }

    #[test]
    fn test_precisions() {
        assert_eq!(precision_for_decimals(6).unwrap(), U256::exp10(12));
        assert_eq!(precision_for_decimals(18).unwrap(), U256::one());
        assert!(precision_for_decimals(24).is_err());
    }

    const BALANCE: &str = "0x00000000000000000000000000000000000000000000003635c9adc5dea00000";
    const A_100: &str = "0x0000000000000000000000000000000000000000000000000000000000000064";
    const FEE_4BPS: &str = "0x00000000000000000000000000000000000000000000000000000000003d0900";

    async fn mock_rpc(server: &mut mockito::Server, selector: &str, response: String) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_body(mockito::Matcher::Regex(format!("0x{}", selector)))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response)
            .create_async()
            .await
    }

    fn rpc_result(word: &str) -> String {
        format!(r#"{{"jsonrpc":"2.0","id":1,"result":"{}"}}"#, word)
    }

    fn rpc_error(code: i64, message: &str) -> String {
        format!(
            r#"{{"jsonrpc":"2.0","id":1,"error":{{"code":{},"message":"{}","data":"0x"}}}}"#,
            code, message
        )
    }

    /// balances, A and fee answer; the optional reads get `stored_rates_response`
    async fn legacy_pool(stored_rates_response: String) -> (mockito::ServerGuard, ContractReader) {
        let mut server = mockito::Server::new_async().await;
        mock_rpc(&mut server, "4903b0d1", rpc_result(BALANCE)).await;
        mock_rpc(&mut server, "f446c1d0", rpc_result(A_100)).await;
        mock_rpc(&mut server, "ddca3f43", rpc_result(FEE_4BPS)).await;
        mock_rpc(&mut server, "8edfdd5f", rpc_error(3, "execution reverted")).await;
        mock_rpc(&mut server, "fd0684b1", stored_rates_response).await;

        let reader = ContractReader::new(&server.url(), 5_000).unwrap();
        (server, reader)
    }

    #[tokio::test]
    async fn test_reverting_optional_reads_use_fallbacks() {
        let (_server, reader) = legacy_pool(rpc_error(3, "execution reverted")).await;

        let snapshot = reader
            .stable_snapshot(Address::repeat_byte(0x45), [18, 6])
            .await
            .unwrap();

        assert_eq!(snapshot.offpeg_fee_multiplier, U256::from(FEE_DENOMINATOR));
        assert_eq!(snapshot.rates, [rate_for_decimals(18), rate_for_decimals(6)]);
        assert_eq!(snapshot.a, U256::from(100u64));
        assert_eq!(snapshot.base_fee, U256::from(4_000_000u64));
    }

    #[tokio::test]
    async fn test_rpc_failure_on_optional_read_fails_snapshot() {
        let (_server, reader) = legacy_pool(rpc_error(-32000, "header not found")).await;

        let err = reader
            .stable_snapshot(Address::repeat_byte(0x45), [18, 6])
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("stored_rates() failed"));
    }

    #[tokio::test]
    #[ignore] // Requires ZAP_TEST_RPC_URL pointing at mainnet
    async fn test_live_stable_snapshot() {
        let rpc = std::env::var("ZAP_TEST_RPC_URL").unwrap();
        let reader = ContractReader::new(&rpc, 10_000).unwrap();
        let pool: Address = "0x453D92C7d4263201C69aACfaf589Ed14202d83a4".parse().unwrap();

        let snapshot = reader.stable_snapshot(pool, [18, 18]).await.unwrap();
        assert!(!snapshot.xp[0].is_zero());
        assert!(snapshot.invariant().is_ok());
    }
}

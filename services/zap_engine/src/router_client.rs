//! Aggregator router client
//!
//! Thin HTTP client over the aggregator's bundle, route and price endpoints.
//! Every request waits on an injected rate limiter first. Nothing here
//! retries: failures are classified with [`RouterError::is_retryable`] and
//! the retry policy belongs to the caller.

use async_trait::async_trait;
use config::RouterConfig;
use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::nonzero;
use reqwest::{RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use types::{Address, RouterTransaction, U256};
use url::Url;

use crate::resolver::RouterRequest;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("router rate limited the request")]
    RateLimited,

    #[error("router server error (status {status}): {body}")]
    Server { status: u16, body: String },

    #[error("router rejected the request (status {status}): {body}")]
    Client { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("router request timed out")]
    Timeout,

    #[error("failed to decode router response: {0}")]
    Decode(String),
}

impl RouterError {
    /// 429, 5xx, transport failures and timeouts
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RouterError::RateLimited
                | RouterError::Server { .. }
                | RouterError::Transport(_)
                | RouterError::Timeout
        )
    }
}

impl From<reqwest::Error> for RouterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RouterError::Timeout
        } else if err.is_decode() {
            RouterError::Decode(err.to_string())
        } else {
            RouterError::Transport(err.to_string())
        }
    }
}

/// Accepts both `"123"` and `123`
fn flexible_u256<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(raw) => {
            U256::from_dec_str(&raw).map_err(|e| D::Error::custom(format!("{:?}", e)))
        }
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| D::Error::custom(format!("non-integer amount {}", n))),
        other => Err(D::Error::custom(format!("unexpected amount {}", other))),
    }
}

fn flexible_u256_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<Address, U256>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "flexible_u256")] U256);

    let raw = HashMap::<Address, Wrapped>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, Wrapped(v))| (k, v)).collect())
}

/// Response to a bundle request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterResponse {
    pub tx: RouterTransaction,
    #[serde(deserialize_with = "flexible_u256")]
    pub gas: U256,
    /// Predicted output per token; may be empty when the router skipped quoting
    #[serde(default, deserialize_with = "flexible_u256_map")]
    pub amounts_out: HashMap<Address, U256>,
}

/// Router-side quote for a single token-to-token route
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuote {
    #[serde(deserialize_with = "flexible_u256")]
    pub amount_out: U256,
    #[serde(deserialize_with = "flexible_u256")]
    pub gas: U256,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

/// Aggregator operations the quote service depends on
#[async_trait]
pub trait AggregatorRouter: Send + Sync {
    async fn bundle(&self, request: &RouterRequest) -> Result<RouterResponse, RouterError>;

    async fn route_quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        from: Address,
    ) -> Result<RouteQuote, RouterError>;
}

pub struct RouterClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    chain_id: u64,
    routing_strategy: String,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl RouterClient {
    pub fn new(
        config: &RouterConfig,
        chain_id: u64,
        limiter: Arc<DefaultDirectRateLimiter>,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to create router HTTP client")?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context("Invalid router base URL")?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            chain_id,
            routing_strategy: config.routing_strategy.clone(),
            limiter,
        })
    }

    /// Per-second limiter shared by everything that talks to the router
    pub fn rate_limiter(requests_per_sec: u32) -> Arc<DefaultDirectRateLimiter> {
        let rate = NonZeroU32::new(requests_per_sec).unwrap_or(nonzero!(1u32));
        Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(rate)))
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn endpoint(&self, path: &str) -> Result<Url, RouterError> {
        self.base_url
            .join(path)
            .map_err(|e| RouterError::Client {
                status: 0,
                body: format!("invalid endpoint {}: {}", path, e),
            })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RouterError> {
        self.limiter.until_ready().await;

        let response = self.authorize(builder).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RouterError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                RouterError::Server {
                    status: status.as_u16(),
                    body,
                }
            } else {
                RouterError::Client {
                    status: status.as_u16(),
                    body,
                }
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RouterError::Decode(e.to_string()))
    }

    /// USD price of one whole token
    pub async fn token_price(&self, token: Address) -> Result<Decimal, RouterError> {
        let url = self.endpoint(&format!("api/v1/prices/{}/{:?}", self.chain_id, token))?;
        let response: PriceResponse = self.send(self.http.get(url)).await?;
        Ok(response.price)
    }
}

#[async_trait]
impl AggregatorRouter for RouterClient {
    async fn bundle(&self, request: &RouterRequest) -> Result<RouterResponse, RouterError> {
        let url = self.endpoint("api/v1/shortcuts/bundle")?;
        crate::log_network!(
            "bundle request: {} actions, skipQuote={}",
            request.actions.len(),
            request.query.skip_quote
        );
        let builder = self
            .http
            .post(url)
            .query(&request.query)
            .json(request.body());
        self.send(builder).await
    }

    async fn route_quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        from: Address,
    ) -> Result<RouteQuote, RouterError> {
        let url = self.endpoint("api/v1/shortcuts/route")?;
        let query = [
            ("chainId", self.chain_id.to_string()),
            ("fromAddress", format!("{:?}", from)),
            ("tokenIn", format!("{:?}", token_in)),
            ("tokenOut", format!("{:?}", token_out)),
            ("amountIn", amount_in.to_string()),
            ("routingStrategy", self.routing_strategy.clone()),
        ];
        crate::log_network!("route quote {:?} -> {:?} for {}", token_in, token_out, amount_in);
        self.send(self.http.get(url).query(&query)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RouterError::RateLimited.is_retryable());
        assert!(RouterError::Timeout.is_retryable());
        assert!(RouterError::Transport("reset".into()).is_retryable());
        assert!(RouterError::Server { status: 502, body: String::new() }.is_retryable());
        assert!(!RouterError::Client { status: 400, body: String::new() }.is_retryable());
        assert!(!RouterError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn test_response_accepts_string_and_numeric_amounts() {
        let raw = r#"{
            "tx": {"to": "0x1111111111111111111111111111111111111111", "data": "0xdeadbeef", "value": "0"},
            "gas": 350000,
            "amountsOut": {"0x2222222222222222222222222222222222222222": "1000000000000000000"}
        }"#;
        let response: RouterResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.gas, U256::from(350_000u64));
        assert_eq!(
            response.amounts_out.get(&Address::repeat_byte(0x22)),
            Some(&U256::exp10(18))
        );
        assert_eq!(response.tx.data.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_missing_amounts_out_defaults_empty() {
        let raw = r#"{
            "tx": {"to": "0x1111111111111111111111111111111111111111", "data": "0x", "value": "0"},
            "gas": "21000"
        }"#;
        let response: RouterResponse = serde_json::from_str(raw).unwrap();
        assert!(response.amounts_out.is_empty());
    }
}

//! Output reference resolver: encodes a bundle as an aggregator router request
//!
//! The router resolves every `{"useOutputOfCallAt": i}` amount at execution
//! time. Its quoting pass does not model long reference chains, so a bundle
//! chained deeper than [`MAX_SIMULATED_REFERENCE_DEPTH`] is sent with
//! `skipQuote=true` and the composer's own final-output estimate.
//!
//! [`MAX_SIMULATED_REFERENCE_DEPTH`]: types::MAX_SIMULATED_REFERENCE_DEPTH

use serde::Serialize;
use types::amount::opt_u256_dec;
use types::{Address, Bundle, BundleAction, BundleError, U256};

/// Caller-side parameters for one router request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    pub chain_id: u64,
    pub from_address: Address,
    /// Defaults to `from_address`
    pub receiver: Option<Address>,
    pub routing_strategy: String,
}

/// Query string of a bundle request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterQuery {
    pub chain_id: u64,
    pub from_address: Address,
    pub receiver: Address,
    pub routing_strategy: String,
    pub skip_quote: bool,
    #[serde(with = "opt_u256_dec", skip_serializing_if = "Option::is_none")]
    pub amount_out: Option<U256>,
}

/// Ordered `{protocol, action, args}` array plus its query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterRequest {
    pub query: RouterQuery,
    pub actions: Vec<BundleAction>,
}

impl RouterRequest {
    pub fn from_bundle(bundle: &Bundle, params: &RequestParams) -> Result<Self, BundleError> {
        // Bundles are validated on construction; re-check before anything leaves the process
        Bundle::validate(bundle.actions())?;
        bundle.ensure_executable()?;

        let amount_out = if bundle.requires_output_estimate() {
            bundle.final_output_estimate()
        } else {
            None
        };

        Ok(Self {
            query: RouterQuery {
                chain_id: params.chain_id,
                from_address: params.from_address,
                receiver: params.receiver.unwrap_or(params.from_address),
                routing_strategy: params.routing_strategy.clone(),
                skip_quote: amount_out.is_some(),
                amount_out,
            },
            actions: bundle.actions().to_vec(),
        })
    }

    /// JSON request body: the bare action array
    pub fn body(&self) -> &[BundleAction] {
        &self.actions
    }
}

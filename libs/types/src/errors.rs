//! Error types for bundle composition and validation
//!
//! Composition errors are raised synchronously and never coerced into a
//! degenerate bundle. Quote failures are a different concern and are not
//! represented here.

use ethers_core::types::Address;
use thiserror::Error;

/// Errors raised while composing or validating a bundle
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// Source and target vault of a vault-to-vault zap are the same contract
    #[error("cannot zap from a vault to itself ({vault:?})")]
    SelfZap {
        /// The vault that appeared on both sides
        vault: Address,
    },

    /// No supported path between the two tokens
    #[error("unsupported token pair: {token_in:?} -> {token_out:?}")]
    UnsupportedPair {
        /// Token being sold
        token_in: Address,
        /// Token being bought
        token_out: Address,
    },

    /// An action references its own output or a later action's output
    #[error("action {action} references output of action {reference}, which does not precede it")]
    ForwardReference {
        /// Index of the action holding the reference
        action: usize,
        /// Index it points at
        reference: usize,
    },

    /// A bundle must contain at least one action
    #[error("bundle contains no actions")]
    EmptyBundle,

    /// Zero input amount
    #[error("zap amount must be greater than zero")]
    ZeroAmount,

    /// Deeply chained bundles need a caller-supplied final output estimate
    #[error("bundle chains {depth} dynamic references but carries no final output estimate")]
    MissingOutputEstimate {
        /// Longest reference chain in the bundle
        depth: usize,
    },
}

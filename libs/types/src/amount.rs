//! Bundle amounts: literal values or references to an earlier action's output
//!
//! The aggregator router resolves a [`Amount::DynamicRef`] at execution time
//! to whatever the referenced action actually produced, so later actions never
//! depend on an off-chain estimate being exact.

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount carried by a bundle action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "AmountRepr", try_from = "AmountRepr")]
pub enum Amount {
    /// Fixed value known when the bundle is composed
    Literal(U256),
    /// Output of the action at this index, resolved by the router on-chain
    DynamicRef(usize),
}

impl Amount {
    /// Unbounded allowance. Granting an allowance never moves funds.
    pub fn max() -> Self {
        Amount::Literal(U256::MAX)
    }

    /// Index of the referenced action, if any
    pub fn reference(&self) -> Option<usize> {
        match self {
            Amount::DynamicRef(index) => Some(*index),
            Amount::Literal(_) => None,
        }
    }

    pub fn literal(&self) -> Option<U256> {
        match self {
            Amount::Literal(value) => Some(*value),
            Amount::DynamicRef(_) => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Amount::DynamicRef(_))
    }
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Amount::Literal(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Literal(value) => write!(f, "{}", value),
            Amount::DynamicRef(index) => write!(f, "output of call #{}", index),
        }
    }
}

/// Wire shape: decimal string, or `{"useOutputOfCallAt": n}`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Literal(String),
    Ref {
        #[serde(rename = "useOutputOfCallAt")]
        use_output_of_call_at: usize,
    },
}

impl From<Amount> for AmountRepr {
    fn from(amount: Amount) -> Self {
        match amount {
            Amount::Literal(value) => AmountRepr::Literal(value.to_string()),
            Amount::DynamicRef(index) => AmountRepr::Ref {
                use_output_of_call_at: index,
            },
        }
    }
}

impl TryFrom<AmountRepr> for Amount {
    type Error = String;

    fn try_from(repr: AmountRepr) -> Result<Self, Self::Error> {
        match repr {
            AmountRepr::Literal(value) => U256::from_dec_str(&value)
                .map(Amount::Literal)
                .map_err(|e| format!("invalid literal amount '{}': {:?}", value, e)),
            AmountRepr::Ref {
                use_output_of_call_at,
            } => Ok(Amount::DynamicRef(use_output_of_call_at)),
        }
    }
}

/// Serde adapter encoding `U256` as a base-10 string, as the router expects
pub mod u256_dec {
    use ethers_core::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_dec_str(&raw).map_err(|e| D::Error::custom(format!("{:?}", e)))
    }
}

/// Same as [`u256_dec`] for optional fields
pub mod opt_u256_dec {
    use ethers_core::types::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| U256::from_dec_str(&raw).map_err(|e| D::Error::custom(format!("{:?}", e))))
            .transpose()
    }
}

//! AMM math errors
//!
//! Each variant corresponds to a condition under which the on-chain pool
//! would revert, so callers must treat them as "no quote" rather than zero.

use thiserror::Error;

pub type AmmResult<T> = std::result::Result<T, AmmError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    /// 256-bit overflow or underflow
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Division by zero (typically an empty pool side)
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    /// Newton iteration exhausted its step budget
    #[error("{solver} did not converge after {iterations} iterations")]
    DidNotConverge {
        solver: &'static str,
        iterations: usize,
    },

    /// Coin index out of range or identical indices
    #[error("invalid coin indices i={i} j={j}")]
    InvalidIndex { i: usize, j: usize },

    /// Input outside the range where the invariant solver is safe
    #[error("unsafe value: {0}")]
    UnsafeValue(&'static str),
}

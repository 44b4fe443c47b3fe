//! Error types for position valuation.

use lp_data::ReadError;
use lp_math::MathError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Read(#[from] ReadError),

    /// User-supplied deposit basis is unusable.
    #[error("invalid deposit basis: {0}")]
    InvalidBasis(String),
}

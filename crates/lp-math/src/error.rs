//! Error types for the valuation math.

use thiserror::Error;

/// Rejected input to a tick or range computation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// `tick_lower` must be strictly below `tick_upper`.
    #[error("invalid tick range: lower {lower} must be below upper {upper}")]
    InvalidRange { lower: i32, upper: i32 },

    /// Tick falls outside `[MIN_TICK, MAX_TICK]`.
    #[error("tick {tick} outside the valid domain [-887272, 887272]")]
    TickOutOfRange { tick: i32 },
}

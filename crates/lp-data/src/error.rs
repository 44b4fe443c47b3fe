//! Error types for chain and price reads.

use thiserror::Error;

/// Failure of a read against the chain or a price source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Malformed user input or configuration (address, URL, numeric setting).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transport failure: unreachable endpoint, timeout, HTTP or RPC-level error.
    #[error("{method} failed: {message}")]
    Network { method: String, message: String },

    /// Payload did not have the expected shape.
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// The call executed and reverted.
    #[error("call reverted: {message}")]
    Revert { message: String },
}

impl ReadError {
    pub(crate) fn network(method: &str, message: impl ToString) -> Self {
        Self::Network {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn decode(what: &str, message: impl ToString) -> Self {
        Self::Decode {
            what: what.to_string(),
            message: message.to_string(),
        }
    }

    /// Only transport failures are worth repeating; reads are idempotent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_retry() {
        assert!(ReadError::network("eth_call", "timeout").is_retryable());
        assert!(!ReadError::decode("slot0", "short").is_retryable());
        assert!(!ReadError::Revert {
            message: "execution reverted".into()
        }
        .is_retryable());
        assert!(!ReadError::InvalidInput("bad".into()).is_retryable());
    }

    #[test]
    fn messages_name_the_failing_piece() {
        let error = ReadError::network("eth_call", "connection refused");
        assert_eq!(error.to_string(), "eth_call failed: connection refused");
    }
}

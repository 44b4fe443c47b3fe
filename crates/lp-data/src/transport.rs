//! Read-only contract call capability.
//!
//! The orchestrator builds [`CallRequest`]s and hands a whole phase to a
//! [`ReadTransport`]. Results come back aligned 1:1 with the requests; a call
//! that reverted or returned garbage is a [`CallOutcome::Unavailable`] slot,
//! one lost in transit is a [`CallOutcome::Failed`] slot. Neither fails the
//! batch.

use std::fmt;
use std::future::Future;

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;

use crate::error::ReadError;

/// Which contract function a request targets. Used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    BalanceOf,
    TokenOfOwnerByIndex,
    Positions,
    Symbol,
    Decimals,
    GetPool,
    Slot0,
    FeeGrowthGlobal0,
    FeeGrowthGlobal1,
    Ticks,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BalanceOf => "balanceOf",
            Self::TokenOfOwnerByIndex => "tokenOfOwnerByIndex",
            Self::Positions => "positions",
            Self::Symbol => "symbol",
            Self::Decimals => "decimals",
            Self::GetPool => "getPool",
            Self::Slot0 => "slot0",
            Self::FeeGrowthGlobal0 => "feeGrowthGlobal0X128",
            Self::FeeGrowthGlobal1 => "feeGrowthGlobal1X128",
            Self::Ticks => "ticks",
        };
        f.write_str(name)
    }
}

/// One `eth_call`: target contract plus ABI-encoded calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub target: Address,
    pub data: Bytes,
    pub kind: CallKind,
}

impl CallRequest {
    pub fn new<C: SolCall>(target: Address, call: &C, kind: CallKind) -> Self {
        Self {
            target,
            data: Bytes::from(call.abi_encode()),
            kind,
        }
    }
}

/// Result slot of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Returned(Bytes),
    /// The call executed but reverted or returned nothing usable.
    Unavailable,
    /// The call never got an answer (timeout, dropped connection). Worth retrying.
    Failed(ReadError),
}

impl CallOutcome {
    /// Decode the slot as the return of `C`; undecodable data counts as unavailable.
    pub fn decode<C: SolCall>(&self) -> Option<C::Return> {
        let CallOutcome::Returned(data) = self else {
            return None;
        };
        match C::abi_decode_returns(data, true) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::debug!(
                    call = C::SIGNATURE,
                    error = %error,
                    bytes = data.len(),
                    "failed to decode return data; treating slot as unavailable"
                );
                None
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Returned(_))
    }

    /// Transport error behind a [`CallOutcome::Failed`] slot.
    pub fn failure(&self) -> Option<&ReadError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Executes a list of independent read calls.
///
/// Implementations may coalesce the list into one aggregated call or issue it
/// call by call; both must yield the same outcomes. An `Err` means the round
/// trip itself failed (nothing came back).
pub trait ReadTransport: Send + Sync {
    fn call_many(
        &self,
        calls: &[CallRequest],
    ) -> impl Future<Output = Result<Vec<CallOutcome>, ReadError>> + Send;
}

/// Merge per-unit results (single calls or aggregated chunks) in request order.
///
/// A unit that failed at the transport level yields `Failed` for each of its
/// slots. If every unit failed, the first error is returned instead, since
/// nothing was learned from this round trip.
pub(crate) fn merge_units(
    units: Vec<(usize, Result<Vec<CallOutcome>, ReadError>)>,
) -> Result<Vec<CallOutcome>, ReadError> {
    let mut first_error = None;
    let mut any_success = false;
    let mut outcomes = Vec::with_capacity(units.iter().map(|(len, _)| *len).sum());

    for (len, unit) in units {
        match unit {
            Ok(slots) => {
                any_success = true;
                outcomes.extend(slots);
            }
            Err(error) => {
                tracing::warn!(slots = len, error = %error, "read unit failed");
                outcomes.extend(std::iter::repeat(CallOutcome::Failed(error.clone())).take(len));
                first_error.get_or_insert(error);
            }
        }
    }

    match first_error {
        Some(error) if !any_success => Err(error),
        _ => Ok(outcomes),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use alloy::sol_types::SolCall;

    use super::*;
    use crate::abi::{IERC20Metadata, INonfungiblePositionManager};

    #[test]
    fn request_carries_selector() {
        let call = INonfungiblePositionManager::balanceOfCall {
            owner: Address::with_last_byte(7),
        };
        let request = CallRequest::new(Address::ZERO, &call, CallKind::BalanceOf);
        assert_eq!(&request.data[..4], INonfungiblePositionManager::balanceOfCall::SELECTOR);
        assert_eq!(request.data.len(), 4 + 32);
    }

    #[test]
    fn decode_returned_slot() {
        let encoded = INonfungiblePositionManager::balanceOfCall::abi_encode_returns(&(U256::from(3u64),));
        let outcome = CallOutcome::Returned(Bytes::from(encoded));
        let decoded = outcome
            .decode::<INonfungiblePositionManager::balanceOfCall>()
            .expect("well-formed return");
        assert_eq!(decoded.balance, U256::from(3u64));
    }

    #[test]
    fn garbage_and_unavailable_slots_decode_to_none() {
        assert!(CallOutcome::Unavailable
            .decode::<IERC20Metadata::decimalsCall>()
            .is_none());
        let short = CallOutcome::Returned(Bytes::from(vec![0u8; 3]));
        assert!(short.decode::<IERC20Metadata::decimalsCall>().is_none());
        assert!(CallOutcome::Returned(Bytes::new())
            .decode::<IERC20Metadata::symbolCall>()
            .is_none());
    }

    #[test]
    fn failed_units_become_failed_slots() {
        let ok = CallOutcome::Returned(Bytes::from(vec![1u8]));
        let timeout = ReadError::network("eth_call", "timeout");
        let merged = merge_units(vec![
            (1, Ok(vec![ok.clone()])),
            (2, Err(timeout.clone())),
            (1, Ok(vec![ok.clone()])),
        ])
        .expect("partial success");
        assert_eq!(
            merged,
            vec![
                ok.clone(),
                CallOutcome::Failed(timeout.clone()),
                CallOutcome::Failed(timeout.clone()),
                ok
            ]
        );
        assert_eq!(merged[1].failure(), Some(&timeout));
        assert!(merged[1].decode::<IERC20Metadata::decimalsCall>().is_none());
        assert!(CallOutcome::Unavailable.failure().is_none());
    }

    #[test]
    fn all_units_failing_is_an_error() {
        let result = merge_units(vec![
            (1, Err(ReadError::network("eth_call", "first"))),
            (1, Err(ReadError::network("eth_call", "second"))),
        ]);
        assert_eq!(result, Err(ReadError::network("eth_call", "first")));
    }
}

//! Multicall3 `aggregate3` encoding.
//!
//! Every inner call is sent with `allowFailure = true`, so one revert never
//! sinks the rest of the chunk. Inner results come back in request order.

use alloy::primitives::Bytes;
use alloy::sol_types::SolCall;

use crate::abi::IMulticall3;
use crate::error::ReadError;
use crate::transport::{CallOutcome, CallRequest};

/// Calldata for one `aggregate3` covering `calls`.
pub fn encode_aggregate(calls: &[CallRequest]) -> Bytes {
    let calls = calls
        .iter()
        .map(|call| IMulticall3::Call3 {
            target: call.target,
            allowFailure: true,
            callData: call.data.clone(),
        })
        .collect();
    Bytes::from(IMulticall3::aggregate3Call { calls }.abi_encode())
}

/// Split an `aggregate3` return into per-call outcomes.
///
/// A failed inner call, or one that returned no data (e.g. the target has no
/// code), becomes [`CallOutcome::Unavailable`].
///
/// # Errors
/// Returns [`ReadError::Decode`] when the outer payload is malformed or its
/// length disagrees with `expected`.
pub fn decode_aggregate(data: &[u8], expected: usize) -> Result<Vec<CallOutcome>, ReadError> {
    let decoded = IMulticall3::aggregate3Call::abi_decode_returns(data, true)
        .map_err(|e| ReadError::decode("aggregate3 return", e))?;

    if decoded.returnData.len() != expected {
        return Err(ReadError::decode(
            "aggregate3 return",
            format!(
                "expected {expected} results, got {}",
                decoded.returnData.len()
            ),
        ));
    }

    Ok(decoded
        .returnData
        .into_iter()
        .map(|result| {
            if result.success && !result.returnData.is_empty() {
                CallOutcome::Returned(result.returnData)
            } else {
                CallOutcome::Unavailable
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;

    use super::*;
    use crate::abi::IUniswapV3Pool;
    use crate::transport::CallKind;

    fn slot0_request(last_byte: u8) -> CallRequest {
        CallRequest::new(
            Address::with_last_byte(last_byte),
            &IUniswapV3Pool::slot0Call {},
            CallKind::Slot0,
        )
    }

    #[test]
    fn encodes_every_call_with_failure_allowed() {
        let calls = vec![slot0_request(1), slot0_request(2)];
        let data = encode_aggregate(&calls);
        let decoded = IMulticall3::aggregate3Call::abi_decode(&data, true).expect("valid calldata");

        assert_eq!(decoded.calls.len(), 2);
        for (inner, request) in decoded.calls.iter().zip(&calls) {
            assert!(inner.allowFailure);
            assert_eq!(inner.target, request.target);
            assert_eq!(inner.callData, request.data);
        }
    }

    #[test]
    fn failed_or_empty_inner_results_are_unavailable() {
        let results = vec![
            IMulticall3::Call3Result {
                success: true,
                returnData: Bytes::from(vec![0xab; 32]),
            },
            IMulticall3::Call3Result {
                success: false,
                returnData: Bytes::from(vec![0x08, 0xc3, 0x79, 0xa0]),
            },
            IMulticall3::Call3Result {
                success: true,
                returnData: Bytes::new(),
            },
        ];
        let encoded = IMulticall3::aggregate3Call::abi_encode_returns(&(results,));

        let outcomes = decode_aggregate(&encoded, 3).expect("well-formed");
        assert_eq!(outcomes[0], CallOutcome::Returned(Bytes::from(vec![0xab; 32])));
        assert_eq!(outcomes[1], CallOutcome::Unavailable);
        assert_eq!(outcomes[2], CallOutcome::Unavailable);
    }

    #[test]
    fn length_mismatch_is_a_decode_error() {
        let encoded = IMulticall3::aggregate3Call::abi_encode_returns(&(Vec::<IMulticall3::Call3Result>::new(),));
        assert!(matches!(
            decode_aggregate(&encoded, 1),
            Err(ReadError::Decode { .. })
        ));
        assert!(decode_aggregate(&[0u8; 5], 0).is_err());
    }
}

//! JSON-RPC `eth_call` transport.
//!
//! [`RpcTransport`] implements [`ReadTransport`] two ways:
//! - batched: each chunk of up to `batch_size` reads is one Multicall3
//!   `aggregate3` call;
//! - individual: one `eth_call` per read, a bounded number in flight.
//!
//! Both produce identical outcomes. If the aggregated call itself reverts (no
//! Multicall3 on the chain, gas limit hit) that chunk is re-issued call by call.
//! A chunk or call lost in transit comes back as [`CallOutcome::Failed`] slots
//! for the orchestrator to retry.

use std::future::Future;
use std::time::Duration;

use alloy::hex;
use alloy::primitives::{Address, Bytes};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ChainConfig;
use crate::error::ReadError;
use crate::multicall::{decode_aggregate, encode_aggregate};
use crate::transport::{merge_units, CallOutcome, CallRequest, ReadTransport};

/// Individual `eth_call`s in flight at once when batching is off.
const MAX_CONCURRENT_CALLS: usize = 10;

/// Aggregated chunks in flight at once.
const MAX_CONCURRENT_CHUNKS: usize = 4;

/// JSON-RPC error code for `execution reverted`.
const REVERT_CODE: i64 = 3;

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// Classify a JSON-RPC error object.
fn classify_rpc_error(method: &str, error: RpcError) -> ReadError {
    if error.code == REVERT_CODE || error.message.to_ascii_lowercase().contains("revert") {
        ReadError::Revert {
            message: error.message,
        }
    } else {
        ReadError::network(method, format!("RPC error {}: {}", error.code, error.message))
    }
}

/// Raw `eth_call` against the latest block.
pub trait EthCall: Send + Sync {
    /// # Errors
    /// [`ReadError::Revert`] when the call reverted, [`ReadError::Network`] for
    /// transport failures and [`ReadError::Decode`] for a malformed result.
    fn eth_call(&self, to: Address, data: &Bytes) -> impl Future<Output = Result<Bytes, ReadError>> + Send;
}

/// Minimal JSON-RPC client over HTTP.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
}

impl RpcClient {
    /// # Errors
    /// Returns [`ReadError::InvalidInput`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ReadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReadError::InvalidInput(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make a JSON-RPC call and extract the hex result string.
    async fn rpc_hex_result(&self, method: &str, params: serde_json::Value) -> Result<String, ReadError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReadError::network(method, format!("request failed: {e}")))?;

        let status = response.status();
        let rpc: RpcResponse<String> = response
            .json()
            .await
            .map_err(|e| ReadError::network(method, format!("unreadable response (HTTP {status}): {e}")))?;

        if let Some(error) = rpc.error {
            return Err(classify_rpc_error(method, error));
        }
        if !status.is_success() {
            return Err(ReadError::network(method, format!("HTTP status {status}")));
        }

        rpc.result
            .ok_or_else(|| ReadError::network(method, "missing result"))
    }
}

impl EthCall for RpcClient {
    async fn eth_call(&self, to: Address, data: &Bytes) -> Result<Bytes, ReadError> {
        let params = serde_json::json!([
            {
                "to": format!("{to:#x}"),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest"
        ]);
        let result = self.rpc_hex_result("eth_call", params).await?;
        hex::decode(result.trim_start_matches("0x"))
            .map(Bytes::from)
            .map_err(|e| ReadError::decode("eth_call result", e))
    }
}

/// [`ReadTransport`] over anything that can `eth_call`; a JSON-RPC endpoint by default.
#[derive(Debug, Clone)]
pub struct RpcTransport<C = RpcClient> {
    client: C,
    multicall: Address,
    batching: bool,
    batch_size: usize,
}

impl RpcTransport<RpcClient> {
    /// # Errors
    /// Returns [`ReadError::InvalidInput`] for an invalid configuration.
    pub fn new(config: &ChainConfig) -> Result<Self, ReadError> {
        config.validate()?;
        let client = RpcClient::new(&config.rpc_url, config.timeout)?;
        Self::with_client(client, config)
    }
}

impl<C: EthCall> RpcTransport<C> {
    /// Batching settings from `config`, calls through `client`.
    ///
    /// # Errors
    /// Returns [`ReadError::InvalidInput`] for an invalid configuration.
    pub fn with_client(client: C, config: &ChainConfig) -> Result<Self, ReadError> {
        config.validate()?;
        Ok(Self {
            client,
            multicall: config.multicall,
            batching: config.batching,
            batch_size: config.batch_size,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// One read; a revert or malformed result is an unavailable slot.
    async fn call_one(&self, call: &CallRequest) -> Result<Vec<CallOutcome>, ReadError> {
        match self.client.eth_call(call.target, &call.data).await {
            Ok(data) => Ok(vec![CallOutcome::Returned(data)]),
            Err(error) if error.is_retryable() => Err(error),
            Err(error) => {
                debug!(kind = %call.kind, target = %call.target, error = %error, "read unavailable");
                Ok(vec![CallOutcome::Unavailable])
            }
        }
    }

    async fn call_individually(&self, calls: &[CallRequest]) -> Result<Vec<CallOutcome>, ReadError> {
        let pending: Vec<_> = calls.iter().map(|call| self.call_one(call)).collect();
        let units: Vec<_> = stream::iter(pending)
            .buffered(MAX_CONCURRENT_CALLS)
            .collect()
            .await;
        merge_units(units.into_iter().map(|unit| (1, unit)).collect())
    }

    async fn call_chunk(&self, chunk: &[CallRequest]) -> Result<Vec<CallOutcome>, ReadError> {
        let data = encode_aggregate(chunk);
        let aggregated = match self.client.eth_call(self.multicall, &data).await {
            Ok(returned) => decode_aggregate(&returned, chunk.len()),
            Err(error) => Err(error),
        };

        match aggregated {
            Ok(outcomes) => Ok(outcomes),
            Err(error) if error.is_retryable() => Err(error),
            Err(error) => {
                warn!(
                    calls = chunk.len(),
                    error = %error,
                    "aggregate3 unusable; falling back to individual calls"
                );
                self.call_individually(chunk).await
            }
        }
    }

    async fn call_aggregated(&self, calls: &[CallRequest]) -> Result<Vec<CallOutcome>, ReadError> {
        let chunks: Vec<&[CallRequest]> = calls.chunks(self.batch_size).collect();
        let pending: Vec<_> = chunks.iter().map(|chunk| self.call_chunk(chunk)).collect();
        let units: Vec<_> = stream::iter(pending)
            .buffered(MAX_CONCURRENT_CHUNKS)
            .collect()
            .await;
        merge_units(
            chunks
                .iter()
                .map(|chunk| chunk.len())
                .zip(units)
                .collect(),
        )
    }
}

impl<C: EthCall> ReadTransport for RpcTransport<C> {
    async fn call_many(&self, calls: &[CallRequest]) -> Result<Vec<CallOutcome>, ReadError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        if self.batching {
            self.call_aggregated(calls).await
        } else {
            self.call_individually(calls).await
        }
    }
}

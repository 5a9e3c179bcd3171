//! Ethereum JSON-RPC transport
//!
//! Thin `reqwest` client for the handful of `eth_*` methods the service
//! needs. No retries: a failed call is reported to the caller as-is.

use super::abi::decode_revert_reason;
use super::types::{parse_hex_bytes, to_hex_bytes, Address, U256};
use super::ChainError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    id: Option<serde_json::Value>,
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Transaction receipt fields the service reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<String>,
    pub status: Option<String>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }

    pub fn block(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|b| U256::from_hex_str(b).ok())
            .and_then(|b| b.to_u64())
    }
}

pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one JSON-RPC call and decode its `result`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>, ChainError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!(method, id = request.id, "JSON-RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Timeout
                } else {
                    ChainError::Unavailable(format!("{}: {}", self.url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Unavailable(format!("HTTP error: {}", status)));
        }

        let body: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::Decode(format!("invalid JSON-RPC response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(rpc_error(error));
        }

        Ok(body.result)
    }

    /// `eth_call` against the latest block, returning raw return data
    pub async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let params = vec![
            serde_json::json!({ "to": to.to_lower_hex(), "data": to_hex_bytes(data) }),
            serde_json::json!("latest"),
        ];
        let result: String = self
            .request("eth_call", params)
            .await?
            .ok_or_else(|| ChainError::Decode("eth_call returned no result".to_string()))?;

        parse_hex_bytes(&result).map_err(|e| ChainError::Decode(e.to_string()))
    }

    /// `eth_sendTransaction` from a node-managed account; returns the tx hash
    pub async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
    ) -> Result<String, ChainError> {
        let params = vec![serde_json::json!({
            "from": from.to_lower_hex(),
            "to": to.to_lower_hex(),
            "data": to_hex_bytes(data),
        })];

        self.request("eth_sendTransaction", params)
            .await?
            .ok_or_else(|| ChainError::Decode("eth_sendTransaction returned no hash".to_string()))
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.request("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let hex: String = self
            .request("eth_chainId", vec![])
            .await?
            .ok_or_else(|| ChainError::Decode("eth_chainId returned no result".to_string()))?;

        U256::from_hex_str(&hex)
            .ok()
            .and_then(|v| v.to_u64())
            .ok_or_else(|| ChainError::Decode(format!("invalid chain id: {}", hex)))
    }
}

/// Map a node error, surfacing a decoded revert reason when the node
/// attached revert data
fn rpc_error(error: JsonRpcError) -> ChainError {
    let reason = error.data.as_ref().and_then(revert_data).and_then(|bytes| {
        decode_revert_reason(&bytes)
    });

    ChainError::Rpc {
        code: error.code,
        message: error.message,
        reason,
    }
}

/// The error a node returns for an `eth_call` or gas estimate that reverts
/// with `data`
#[cfg(test)]
pub(super) fn revert_error(data: &[u8]) -> ChainError {
    rpc_error(JsonRpcError {
        code: 3,
        message: "execution reverted".to_string(),
        data: Some(serde_json::Value::String(to_hex_bytes(data))),
    })
}

/// Nodes nest revert data either directly (`"0x..."`) or as `{ "data": "0x..." }`
fn revert_data(value: &serde_json::Value) -> Option<Vec<u8>> {
    match value {
        serde_json::Value::String(s) => parse_hex_bytes(s).ok(),
        serde_json::Value::Object(map) => map.get("data").and_then(revert_data),
        _ => None,
    }
}

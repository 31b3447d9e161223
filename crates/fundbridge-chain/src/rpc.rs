use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use primitive_types::U256;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ChainError;

/// Minimal Ethereum JSON-RPC client. One instance is shared process-wide.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("rpc #{} {}", id, method);
        let resp: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        resp.result
            .ok_or_else(|| ChainError::MalformedResponse(format!("{} returned neither result nor error", method)))
    }

    /// Read-only call against the latest block. Returns raw return data.
    pub async fn eth_call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let result: String = self
            .request(
                "eth_call",
                json!([{ "to": to, "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;
        parse_data(&result)
    }

    /// Submits a signed transaction. Returns the transaction hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, ChainError> {
        self.request("eth_sendRawTransaction", json!([format!("0x{}", hex::encode(raw))]))
            .await
    }

    /// Next nonce for `address`, counting transactions still in the pool.
    pub async fn transaction_count(&self, address: &str) -> Result<u64, ChainError> {
        let result: String = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_quantity(&result)
    }

    pub async fn estimate_gas(&self, from: &str, to: &str, data: &[u8], value: U256) -> Result<U256, ChainError> {
        let result: String = self
            .request(
                "eth_estimateGas",
                json!([{
                    "from": from,
                    "to": to,
                    "data": format!("0x{}", hex::encode(data)),
                    "value": to_quantity(value),
                }]),
            )
            .await?;
        parse_quantity_u256(&result)
    }

    pub async fn max_priority_fee(&self) -> Result<U256, ChainError> {
        let result: String = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        parse_quantity_u256(&result)
    }

    pub async fn gas_price(&self) -> Result<U256, ChainError> {
        let result: String = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity_u256(&result)
    }

    /// Base fee of the latest block; `None` before London.
    pub async fn base_fee(&self) -> Result<Option<U256>, ChainError> {
        let block: Value = self.request("eth_getBlockByNumber", json!(["latest", false])).await?;
        block
            .get("baseFeePerGas")
            .and_then(Value::as_str)
            .map(parse_quantity_u256)
            .transpose()
    }

    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let result: String = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&result)
    }

    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let result: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&result)
    }
}

/// Hex quantity without leading zeros, `0x0` for zero.
pub fn to_quantity(value: U256) -> String {
    if value.is_zero() {
        return "0x0".to_string();
    }
    format!("0x{:x}", value)
}

pub fn parse_quantity(s: &str) -> Result<u64, ChainError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::MalformedResponse(format!("quantity without 0x prefix: {}", s)))?;
    u64::from_str_radix(digits, 16).map_err(|_| ChainError::MalformedResponse(format!("bad quantity: {}", s)))
}

pub fn parse_quantity_u256(s: &str) -> Result<U256, ChainError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::MalformedResponse(format!("quantity without 0x prefix: {}", s)))?;
    if digits.is_empty() || digits.len() > 64 {
        return Err(ChainError::MalformedResponse(format!("bad quantity: {}", s)));
    }
    U256::from_str_radix(digits, 16).map_err(|_| ChainError::MalformedResponse(format!("bad quantity: {}", s)))
}

pub fn parse_data(s: &str) -> Result<Vec<u8>, ChainError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::MalformedResponse(format!("data without 0x prefix: {}", s)))?;
    hex::decode(digits).map_err(|_| ChainError::MalformedResponse("return data is not hex".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0xaa36a7").unwrap(), 11_155_111);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(parse_quantity("12").is_err());
        assert!(parse_quantity("0xzz").is_err());

        assert_eq!(parse_quantity_u256("0x3b9aca00").unwrap(), U256::from(1_000_000_000u64));
        assert_eq!(parse_quantity_u256(&format!("0x{}", "f".repeat(64))).unwrap(), U256::MAX);
        assert!(parse_quantity_u256("0x").is_err());
        assert!(parse_quantity_u256(&format!("0x1{}", "0".repeat(64))).is_err());
    }

    #[test]
    fn data() {
        assert_eq!(parse_data("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_data("0x00ff").unwrap(), vec![0x00, 0xff]);
        assert!(parse_data("00ff").is_err());
    }

    #[test]
    fn value_is_hex_quantity() {
        assert_eq!(to_quantity(U256::exp10(18)), "0xde0b6b3a7640000");
        assert_eq!(to_quantity(U256::zero()), "0x0");
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let rpc = RpcClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = rpc.chain_id().await.unwrap_err();
        assert!(matches!(err, ChainError::Transport(_)));
    }
}

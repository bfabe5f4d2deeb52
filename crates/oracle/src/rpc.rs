//! Minimal JSON-RPC 2.0 over HTTP.

use crate::abi::parse_hex_u64;
use crate::ledger::{LedgerError, LedgerResult};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> LedgerResult<Self> {
        // No system proxy: avoids SCDynamicStore panics in sandboxed environments.
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn request(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params
        });
        let resp = self.client.post(&self.url).json(&body).send().await?;
        let json: Value = resp.json().await?;
        if let Some(err) = json.get("error") {
            return Err(rpc_error(err));
        }
        json.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Decode(format!("{method}: missing result")))
    }

    /// Request whose result is a hex quantity (`eth_blockNumber`, `eth_chainId`, ...).
    pub async fn request_quantity(&self, method: &str, params: Value) -> LedgerResult<u64> {
        let result = self.request(method, params).await?;
        parse_quantity(&result)
    }
}

pub fn parse_quantity(value: &Value) -> LedgerResult<u64> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::Decode(format!("quantity not string: {value}")))?;
    Ok(parse_hex_u64(s)?)
}

pub fn quantity(n: u64) -> String {
    format!("0x{:x}", n)
}

fn rpc_error(err: &Value) -> LedgerError {
    let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
    let message = err
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| err.to_string());
    if is_block_not_found(&message) {
        LedgerError::BlockNotFound(message)
    } else {
        LedgerError::Rpc { code, message }
    }
}

/// Node wording differs ("header not found", "unknown block", "block not found").
fn is_block_not_found(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    (m.contains("block") || m.contains("header"))
        && (m.contains("not found") || m.contains("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_not_found_wording() {
        assert!(is_block_not_found("header not found"));
        assert!(is_block_not_found("unknown block"));
        assert!(is_block_not_found("Block not found: 0x1234"));
        assert!(!is_block_not_found("execution reverted"));
        assert!(!is_block_not_found("nonce too low"));
    }

    #[test]
    fn rpc_error_mapping() {
        let e = rpc_error(&json!({"code": -32000, "message": "header not found"}));
        assert!(matches!(e, LedgerError::BlockNotFound(_)));
        let e = rpc_error(&json!({"code": -32000, "message": "insufficient funds for gas"}));
        match e {
            LedgerError::Rpc { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "insufficient funds for gas");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity(&json!("0x7a69")).unwrap(), 31337);
        assert!(parse_quantity(&json!(12)).is_err());
        assert_eq!(quantity(255), "0xff");
    }
}

//! Minimal JSON-RPC 2.0 transport.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::ChainClientError;

/// Default RPC timeout.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 20;

/// One JSON-RPC endpoint.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainClientError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Issues one call, unwrapping the JSON-RPC envelope.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ChainClientError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        debug!(method, "rpc call");

        let response: Value = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(ChainClientError::Rpc {
                code: error["code"].as_i64().unwrap_or(0),
                message: error["message"].as_str().unwrap_or("unknown").to_string(),
            });
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| ChainClientError::InvalidResponse("missing result".into()))
    }
}

/// Parses a `0x`-prefixed quantity.
pub fn parse_quantity(value: &Value) -> Option<u64> {
    let s = value.as_str()?;
    u64::from_str_radix(s.strip_prefix("0x")?, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_parsing() {
        assert_eq!(parse_quantity(&json!("0x3039")), Some(12345));
        assert_eq!(parse_quantity(&json!("0x0")), Some(0));
        assert_eq!(parse_quantity(&json!("nope")), None);
        assert_eq!(parse_quantity(&json!(12)), None);
    }
}

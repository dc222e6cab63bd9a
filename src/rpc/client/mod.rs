/// JSON-RPC transport over reqwest
///
/// One primary endpoint plus ordered fallbacks. A fallback is only tried when
/// the previous endpoint failed at transport level (connection, timeout,
/// HTTP 429/5xx); a JSON-RPC error object is an answer and is returned as is.
pub mod methods;

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::RpcConfig;
use crate::errors::{CopyTraderError, NetworkError, RpcProviderError};
use crate::logger::{self, LogTag};

pub struct JsonRpcClient {
    http: reqwest::Client,
    urls: Vec<String>,
    timeout: Duration,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self, CopyTraderError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CopyTraderError::network(format!("Failed to build HTTP client: {}", e)))?;

        let urls: Vec<String> = std::iter::once(config.url.clone())
            .chain(config.fallbacks.iter().cloned())
            .filter(|u| !u.trim().is_empty())
            .collect();

        Ok(Self {
            http,
            urls,
            timeout,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn primary_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }

    /// Execute one JSON-RPC call and return its `result` member
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CopyTraderError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        for url in &self.urls {
            match self.call_endpoint(url, method, &payload).await {
                Ok(result) => return Ok(result),
                Err(e @ CopyTraderError::RpcProvider(RpcProviderError::CallFailed { .. })) => {
                    return Err(e);
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Rpc,
                        &format!("{} failed on {}: {}", method, url, e),
                    );
                }
            }
        }

        Err(RpcProviderError::AllEndpointsFailed {
            method: method.to_string(),
            count: self.urls.len(),
        }
        .into())
    }

    async fn call_endpoint(
        &self,
        url: &str,
        method: &str,
        payload: &Value,
    ) -> Result<Value, CopyTraderError> {
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CopyTraderError::Network(NetworkError::Timeout {
                        endpoint: url.to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    })
                } else {
                    CopyTraderError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::HttpStatus {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body: crate::utils::safe_truncate(&body, 200).to_string(),
            }
            .into());
        }

        let body: Value = response.json().await?;
        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.to_string());
            return Err(RpcProviderError::CallFailed {
                endpoint: url.to_string(),
                method: method.to_string(),
                message,
            }
            .into());
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| {
                RpcProviderError::MalformedResponse {
                    method: method.to_string(),
                    details: "missing result".to_string(),
                }
                .into()
            })
    }
}

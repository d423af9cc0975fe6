use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;

use super::error::JsonError;
use super::error::JsonRequest;
use super::error::JsonResult;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: &str, params: serde_json::Value) -> JsonResult<serde_json::Value>;
}

/// JSON-RPC 2.0 over HTTP POST to a single endpoint.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    url: String,
    client: Client,
    last_id: Arc<AtomicU64>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, Client::new())
    }

    /// Shares one connection pool between the transports of several
    /// endpoints on the same node.
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
            last_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: serde_json::Value) -> JsonResult<serde_json::Value> {
        let request = JsonRequest {
            jsonrpc: Some("2.0".to_string()),
            method: method.to_string(),
            params,
            id: Some(self.last_id.fetch_add(1, Ordering::SeqCst).into()),
        };
        trace!(url = %self.url, method, "JSON-RPC call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| JsonError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(JsonError::Transport(format!(
                "{} returned status {}",
                self.url,
                response.status()
            )));
        }

        let value: serde_json::Value = response.json().await.map_err(|_| JsonError::ParseError)?;

        if let Some(error_val) = value.get("error") {
            return Err(
                serde_json::from_value(error_val.clone()).unwrap_or(JsonError::InternalError)
            );
        }

        value.get("result").cloned().ok_or(JsonError::InvalidParams)
    }
}

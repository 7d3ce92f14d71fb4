// src/rpc/https.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::eips::eip1193::{codes, Eip1193Provider, RpcMethod};
use crate::error::ProviderError;
use crate::evm::chains::NetworkDescriptor;

/// JSON-RPC request body
#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Read-only provider over a public HTTPS endpoint.
///
/// Holds no keys: methods that need a wallet are refused locally with 4200.
pub struct HttpProvider {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(url: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(10)
            .http2_keep_alive_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ProviderError::Transport(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn for_network(network: &NetworkDescriptor) -> Result<Self, ProviderError> {
        Self::new(&network.rpc_url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let payload = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("Request failed: {}", e)))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("Invalid JSON response: {}", e)))?;

        decode_response(method, body)
    }
}

fn decode_response(method: &str, body: Value) -> Result<Value, ProviderError> {
    let response: JsonRpcResponse = serde_json::from_value(body).map_err(|e| ProviderError::Transport(format!("Invalid JSON-RPC envelope: {}", e)))?;

    if let Some(err) = response.error {
        log::debug!("{} returned RPC error {}: {}", method, err.code, err.message);
        return Err(ProviderError::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }
    // `null` is a valid result (e.g. a receipt that is not mined yet)
    Ok(response.result.unwrap_or(Value::Null))
}

#[async_trait]
impl Eip1193Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match RpcMethod::parse(method) {
            Some(known) if known.is_wallet_only() => Err(ProviderError::rpc(
                codes::UNSUPPORTED_METHOD,
                format!("{} requires a wallet", method),
            )),
            // no accounts behind a public endpoint
            Some(RpcMethod::EthAccounts) => Ok(json!([])),
            _ => self.post(method, params).await,
        }
    }
}

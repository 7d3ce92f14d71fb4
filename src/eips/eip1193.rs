// src/eips/eip1193.rs

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::ProviderError;
use crate::evm::address::parse_accounts;
use crate::evm::chains::NetworkDescriptor;
use crate::utils::num::{u64_to_quantity, value_to_u64};
use crate::utils::serde::deserialize_option_u64_from_str_or_int;

/// Provider error codes from EIP-1193 / EIP-1474 that the client inspects.
pub mod codes {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    /// EIP-3326: the wallet does not know the requested chain.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    pub const EXECUTION_REVERTED: i64 = 3;
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    EthChainId,
    EthAccounts,
    EthRequestAccounts,
    WalletSwitchEthereumChain,
    WalletAddEthereumChain,
    EthCall,
    EthSendTransaction,
    EthGetTransactionReceipt,
    EthBlockNumber,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EthChainId => "eth_chainId",
            Self::EthAccounts => "eth_accounts",
            Self::EthRequestAccounts => "eth_requestAccounts",
            Self::WalletSwitchEthereumChain => "wallet_switchEthereumChain",
            Self::WalletAddEthereumChain => "wallet_addEthereumChain",
            Self::EthCall => "eth_call",
            Self::EthSendTransaction => "eth_sendTransaction",
            Self::EthGetTransactionReceipt => "eth_getTransactionReceipt",
            Self::EthBlockNumber => "eth_blockNumber",
        }
    }

    pub fn parse(method: &str) -> Option<Self> {
        Some(match method {
            "eth_chainId" => Self::EthChainId,
            "eth_accounts" => Self::EthAccounts,
            "eth_requestAccounts" => Self::EthRequestAccounts,
            "wallet_switchEthereumChain" => Self::WalletSwitchEthereumChain,
            "wallet_addEthereumChain" => Self::WalletAddEthereumChain,
            "eth_call" => Self::EthCall,
            "eth_sendTransaction" => Self::EthSendTransaction,
            "eth_getTransactionReceipt" => Self::EthGetTransactionReceipt,
            "eth_blockNumber" => Self::EthBlockNumber,
            _ => return None,
        })
    }

    /// Methods only a wallet can answer (they need keys or user consent).
    pub fn is_wallet_only(&self) -> bool {
        matches!(
            self,
            Self::EthRequestAccounts
                | Self::WalletSwitchEthereumChain
                | Self::WalletAddEthereumChain
                | Self::EthSendTransaction
        )
    }
}

/// `provider.request({ method, params })`
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Stream of `accountsChanged` / `chainChanged` / `connect` / `disconnect`.
    fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Connect { chain_id: u64 },
    Disconnect,
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

impl ProviderEvent {
    /// Builds an event from the name and payload a JS provider emits.
    pub fn from_js(name: &str, payload: &Value) -> Option<Self> {
        match name {
            "accountsChanged" => parse_accounts(payload).ok().map(Self::AccountsChanged),
            "chainChanged" => value_to_u64(payload).map(Self::ChainChanged),
            "connect" => value_to_u64(payload.get("chainId")?).map(|chain_id| Self::Connect { chain_id }),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }
}

// ==================== transactions ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

impl TransactionRequest {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            data: data.into(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default, deserialize_with = "deserialize_option_u64_from_str_or_int")]
    pub block_number: Option<u64>,
    /// 1 = success, 0 = reverted. Absent on pre-Byzantium chains.
    #[serde(default, deserialize_with = "deserialize_option_u64_from_str_or_int")]
    pub status: Option<u64>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }
}

// ==================== typed wallet capability ====================

/// Typed view over an injected provider, with an optional per-request timeout.
#[derive(Clone)]
pub struct WalletProvider {
    inner: Arc<dyn Eip1193Provider>,
    timeout: Option<Duration>,
}

impl fmt::Debug for WalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletProvider").field("timeout", &self.timeout).finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(method: RpcMethod, value: Value) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::Decode {
        method: method.as_str(),
        reason: e.to_string(),
    })
}

fn decode_hex(method: RpcMethod, value: &Value) -> Result<Bytes, ProviderError> {
    let raw = value.as_str().unwrap_or_default();
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map(Bytes::from)
        .map_err(|e| ProviderError::Decode {
            method: method.as_str(),
            reason: format!("{raw}: {e}"),
        })
}

fn decode_quantity(method: RpcMethod, value: &Value) -> Result<u64, ProviderError> {
    value_to_u64(value).ok_or_else(|| ProviderError::Decode {
        method: method.as_str(),
        reason: format!("not a quantity: {value}"),
    })
}

impl WalletProvider {
    pub fn new(inner: Arc<dyn Eip1193Provider>) -> Self {
        Self { inner, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        self.inner.events()
    }

    pub async fn request(&self, method: RpcMethod, params: Value) -> Result<Value, ProviderError> {
        log::debug!("-> {}", method.as_str());
        let pending = self.inner.request(method.as_str(), params);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| ProviderError::Timeout {
                method: method.as_str(),
                elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })?,
            None => pending.await,
        };
        if let Err(e) = &result {
            log::debug!("<- {} failed: {}", method.as_str(), e);
        }
        result
    }

    /// Already-authorized accounts, never prompts.
    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let result = self.request(RpcMethod::EthAccounts, json!([])).await?;
        parse_accounts(&result).map_err(|reason| ProviderError::Decode {
            method: RpcMethod::EthAccounts.as_str(),
            reason,
        })
    }

    /// May prompt the user.
    pub async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let result = self.request(RpcMethod::EthRequestAccounts, json!([])).await?;
        parse_accounts(&result).map_err(|reason| ProviderError::Decode {
            method: RpcMethod::EthRequestAccounts.as_str(),
            reason,
        })
    }

    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let result = self.request(RpcMethod::EthChainId, json!([])).await?;
        decode_quantity(RpcMethod::EthChainId, &result)
    }

    pub async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        self.request(
            RpcMethod::WalletSwitchEthereumChain,
            json!([{ "chainId": u64_to_quantity(chain_id) }]),
        )
        .await
        .map(|_| ())
    }

    pub async fn add_chain(&self, network: &NetworkDescriptor) -> Result<(), ProviderError> {
        self.request(RpcMethod::WalletAddEthereumChain, json!([network.add_chain_params()]))
            .await
            .map(|_| ())
    }

    /// `eth_call` at `latest`, or at a specific block when replaying.
    pub async fn call(&self, tx: &TransactionRequest, block: Option<u64>) -> Result<Bytes, ProviderError> {
        let tag = block.map(u64_to_quantity).unwrap_or_else(|| "latest".to_string());
        let result = self.request(RpcMethod::EthCall, json!([tx, tag])).await?;
        decode_hex(RpcMethod::EthCall, &result)
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ProviderError> {
        let result = self.request(RpcMethod::EthSendTransaction, json!([tx])).await?;
        decode(RpcMethod::EthSendTransaction, result)
    }

    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, ProviderError> {
        let result = self.request(RpcMethod::EthGetTransactionReceipt, json!([hash])).await?;
        decode(RpcMethod::EthGetTransactionReceipt, result)
    }

    pub async fn block_number(&self) -> Result<u64, ProviderError> {
        let result = self.request(RpcMethod::EthBlockNumber, json!([])).await?;
        decode_quantity(RpcMethod::EthBlockNumber, &result)
    }

    pub fn signer(&self, address: Address) -> Signer {
        Signer {
            provider: self.clone(),
            address,
        }
    }
}

// ==================== signer ====================

/// Account-bound sending capability. The wallet holds the keys.
#[derive(Debug, Clone)]
pub struct Signer {
    provider: WalletProvider,
    address: Address,
}

impl Signer {
    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn send_transaction(&self, mut tx: TransactionRequest) -> Result<PendingTransaction, ProviderError> {
        tx.from = Some(self.address);
        let hash = self.provider.send_transaction(&tx).await?;
        log::info!("submitted transaction {} from {}", hash, self.address);
        Ok(PendingTransaction {
            hash,
            request: tx,
            provider: self.provider.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PendingTransaction {
    hash: B256,
    request: TransactionRequest,
    provider: WalletProvider,
}

impl PendingTransaction {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    /// Polls until the transaction is `confirmations` blocks deep.
    ///
    /// Transport failures and timeouts are retried on the next poll; an RPC
    /// error ends the wait.
    pub async fn wait(&self, confirmations: u64, poll_interval: Duration) -> Result<TransactionReceipt, ProviderError> {
        loop {
            match self.poll(confirmations).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) if e.is_transient() => log::debug!("polling {} failed, retrying: {}", self.hash, e),
                Err(e) => return Err(e),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn poll(&self, confirmations: u64) -> Result<Option<TransactionReceipt>, ProviderError> {
        let Some(receipt) = self.provider.transaction_receipt(self.hash).await? else {
            return Ok(None);
        };
        if confirmations <= 1 {
            return Ok(Some(receipt));
        }
        let Some(mined_at) = receipt.block_number else {
            return Ok(None);
        };
        let head = self.provider.block_number().await?;
        Ok((head.saturating_sub(mined_at) + 1 >= confirmations).then_some(receipt))
    }
}

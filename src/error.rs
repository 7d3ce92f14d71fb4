// src/error.rs

use serde_json::Value;
use thiserror::Error;

use crate::constants::{
    STATUS_BUSY, STATUS_CONNECT_FAILED, STATUS_CONNECT_FIRST, STATUS_CONNECT_REJECTED,
    STATUS_INSTALL_PROVIDER, STATUS_SWITCH_REJECTED, STATUS_TX_FAILED, STATUS_TX_REJECTED,
};
use crate::eips::eip1193::codes;
use crate::evm::abi::decode_revert;

// ==================== codec ====================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("attribution tag is {0} bytes, the length field holds at most 255")]
    TagTooLong(usize),
    #[error("attribution tag must be ASCII")]
    NonAscii,
}

// ==================== provider ====================

/// Failure of a single provider request.
///
/// `Rpc` mirrors the EIP-1193 `ProviderRpcError` shape; the other variants are
/// raised locally before or instead of a provider answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("provider error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("{method} timed out after {elapsed_ms}ms")]
    Timeout { method: &'static str, elapsed_ms: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid {method} response: {reason}")]
    Decode { method: &'static str, reason: String },
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Some mobile wallets wrap the real code as `data.originalError.code`.
    fn nested_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { data: Some(data), .. } => data.get("originalError")?.get("code")?.as_i64(),
            _ => None,
        }
    }

    fn has_code(&self, wanted: i64) -> bool {
        self.code() == Some(wanted) || self.nested_code() == Some(wanted)
    }

    pub fn is_user_rejected(&self) -> bool {
        self.has_code(codes::USER_REJECTED)
    }

    pub fn is_chain_not_recognized(&self) -> bool {
        self.has_code(codes::UNRECOGNIZED_CHAIN)
    }

    /// Transport failures and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }

    /// Revert reason carried by an execution failure, if any.
    ///
    /// ABI-encoded revert data wins over the `execution reverted: ...` text.
    pub fn revert_reason(&self) -> Option<String> {
        let Self::Rpc { message, data, .. } = self else {
            return None;
        };
        if let Some(reason) = data
            .as_ref()
            .and_then(revert_data)
            .and_then(|bytes| decode_revert(&bytes))
        {
            return Some(reason);
        }
        message
            .split_once("execution reverted:")
            .map(|(_, reason)| reason.trim().to_string())
            .filter(|reason| !reason.is_empty())
    }
}

fn revert_data(data: &Value) -> Option<Vec<u8>> {
    match data {
        Value::String(s) => hex::decode(s.strip_prefix("0x")?).ok(),
        Value::Object(map) => ["data", "originalError"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(revert_data),
        _ => None,
    }
}

// ==================== network ====================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    #[error("could not read the wallet network: {0}")]
    Unreadable(ProviderError),
    #[error("network switch rejected by user: {0}")]
    SwitchRejected(ProviderError),
    #[error("network switch failed: {0}")]
    SwitchFailed(ProviderError),
    #[error("network registration failed: {0}")]
    RegistrationFailed(ProviderError),
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    Mismatched { expected: u64, actual: u64 },
}

impl NetworkError {
    pub fn status_message(&self, network_name: &str) -> String {
        match self {
            Self::SwitchRejected(_) => STATUS_SWITCH_REJECTED.to_string(),
            Self::RegistrationFailed(e) if e.is_user_rejected() => STATUS_SWITCH_REJECTED.to_string(),
            _ => format!("Please switch your wallet to {network_name}."),
        }
    }
}

// ==================== session ====================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectError {
    #[error("no wallet provider available")]
    ProviderMissing,
    #[error("another wallet operation is in flight")]
    Busy,
    #[error("account request rejected by user")]
    Rejected,
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("account request failed: {0}")]
    Provider(ProviderError),
}

impl ConnectError {
    pub fn status_message(&self, network_name: &str) -> String {
        match self {
            Self::ProviderMissing => STATUS_INSTALL_PROVIDER.to_string(),
            Self::Busy => STATUS_BUSY.to_string(),
            Self::Rejected => STATUS_CONNECT_REJECTED.to_string(),
            Self::Network(e) => e.status_message(network_name),
            Self::Provider(_) => STATUS_CONNECT_FAILED.to_string(),
        }
    }
}

// ==================== transactions ====================

/// Outcome of a counter read or write that did not produce a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TxError {
    #[error("no wallet provider available")]
    ProviderMissing,
    #[error("no connected account")]
    NoSession,
    #[error("another wallet operation is in flight")]
    Busy,
    #[error("wrong network: {0}")]
    WrongNetwork(NetworkError),
    #[error("transaction rejected by user")]
    Rejected,
    #[error("transaction reverted: {}", .0.as_deref().unwrap_or("no reason given"))]
    ContractRevert(Option<String>),
    #[error("transaction failed: {0}")]
    Unknown(String),
}

impl TxError {
    pub fn status_message(&self, network_name: &str) -> String {
        match self {
            Self::ProviderMissing => STATUS_INSTALL_PROVIDER.to_string(),
            Self::NoSession => STATUS_CONNECT_FIRST.to_string(),
            Self::Busy => STATUS_BUSY.to_string(),
            Self::WrongNetwork(e) => e.status_message(network_name),
            Self::Rejected => STATUS_TX_REJECTED.to_string(),
            Self::ContractRevert(Some(reason)) => format!("Error: {reason}"),
            Self::ContractRevert(None) | Self::Unknown(_) => STATUS_TX_FAILED.to_string(),
        }
    }
}

impl From<ProviderError> for TxError {
    fn from(e: ProviderError) -> Self {
        if e.is_user_rejected() {
            Self::Rejected
        } else if let Some(reason) = e.revert_reason() {
            Self::ContractRevert(Some(reason))
        } else {
            Self::Unknown(e.to_string())
        }
    }
}

// ==================== config ====================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("chain {0} is not a known network")]
    UnknownChain(u64),
    #[error("contract address must not be the zero address")]
    ZeroContract,
    #[error("confirmations must be at least 1")]
    ZeroConfirmations,
    #[error(transparent)]
    Tag(#[from] EncodingError),
}

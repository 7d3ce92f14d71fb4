// src/core/config.rs

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    COUNTER_ADDRESS, DEFAULT_ATTRIBUTION_TAG, DEFAULT_CHAIN_ID, DEFAULT_CONFIRMATIONS,
    DEFAULT_RECEIPT_POLL_INTERVAL_MS, DEFAULT_STATUS_CLEAR_DELAY_MS,
};
use crate::eips::eip8021::AttributionTag;
use crate::error::ConfigError;
use crate::evm::address::is_zero_address;
use crate::evm::chains::ChainRegistry;
use crate::utils::serde::deserialize_u64_from_str_or_int;

/// Deployment settings. Every field is optional in JSON and falls back to the
/// Base mainnet counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(deserialize_with = "deserialize_u64_from_str_or_int")]
    pub chain_id: u64,
    pub contract_address: Address,
    pub attribution_tag: String,
    pub confirmations: u64,
    pub receipt_poll_interval_ms: u64,
    pub status_clear_delay_ms: u64,
    /// No limit when absent; wallet prompts can legitimately take minutes.
    pub request_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            contract_address: COUNTER_ADDRESS,
            attribution_tag: DEFAULT_ATTRIBUTION_TAG.to_string(),
            confirmations: DEFAULT_CONFIRMATIONS,
            receipt_poll_interval_ms: DEFAULT_RECEIPT_POLL_INTERVAL_MS,
            status_clear_delay_ms: DEFAULT_STATUS_CLEAR_DELAY_MS,
            request_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("loading client config from {}", path.display());
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry()?;
        self.attribution_tag()?;
        if is_zero_address(&self.contract_address) {
            return Err(ConfigError::ZeroContract);
        }
        if self.confirmations == 0 {
            return Err(ConfigError::ZeroConfirmations);
        }
        Ok(())
    }

    pub fn registry(&self) -> Result<ChainRegistry, ConfigError> {
        ChainRegistry::for_chain(self.chain_id).ok_or(ConfigError::UnknownChain(self.chain_id))
    }

    pub fn attribution_tag(&self) -> Result<AttributionTag, ConfigError> {
        Ok(AttributionTag::new(self.attribution_tag.as_str())?)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn status_clear_delay(&self) -> Duration {
        Duration::from_millis(self.status_clear_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

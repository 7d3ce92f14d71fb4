// src/evm/chains.rs

use alloy_primitives::B256;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::utils::num::u64_to_quantity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Static description of one EVM network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub display_name: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub native_currency: NativeCurrency,
}

/// EIP-3085 `wallet_addEthereumChain` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEthereumChainParameter {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl NetworkDescriptor {
    /// Chain ids compare as integers; callers normalize hex first.
    pub fn matches(&self, chain_id: u64) -> bool {
        self.chain_id == chain_id
    }

    pub fn hex_chain_id(&self) -> String {
        u64_to_quantity(self.chain_id)
    }

    pub fn add_chain_params(&self) -> AddEthereumChainParameter {
        AddEthereumChainParameter {
            chain_id: self.hex_chain_id(),
            chain_name: self.display_name.clone(),
            native_currency: self.native_currency.clone(),
            rpc_urls: vec![self.rpc_url.clone()],
            block_explorer_urls: vec![self.explorer_url.clone()],
        }
    }

    pub fn tx_url(&self, hash: &B256) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), hash)
    }
}

fn ether_network(chain_id: u64, display_name: &str, currency_name: &str, rpc_url: &str, explorer_url: &str) -> NetworkDescriptor {
    NetworkDescriptor {
        chain_id,
        display_name: display_name.to_string(),
        rpc_url: rpc_url.to_string(),
        explorer_url: explorer_url.to_string(),
        native_currency: NativeCurrency {
            name: currency_name.to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        },
    }
}

pub static KNOWN_NETWORKS: Lazy<Vec<NetworkDescriptor>> = Lazy::new(|| {
    vec![
        ether_network(8453, "Base", "Ether", "https://mainnet.base.org", "https://basescan.org"),
        ether_network(84532, "Base Sepolia", "Sepolia Ether", "https://sepolia.base.org", "https://sepolia.basescan.org"),
        ether_network(1, "Ethereum", "Ether", "https://ethereum.publicnode.com", "https://etherscan.io"),
        ether_network(11155111, "Sepolia", "Sepolia Ether", "https://ethereum-sepolia.publicnode.com", "https://sepolia.etherscan.io"),
    ]
});

pub fn find_network(chain_id: u64) -> Option<&'static NetworkDescriptor> {
    KNOWN_NETWORKS.iter().find(|n| n.matches(chain_id))
}

/// The one network this deployment requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRegistry {
    required: NetworkDescriptor,
}

impl ChainRegistry {
    pub fn new(required: NetworkDescriptor) -> Self {
        Self { required }
    }

    pub fn for_chain(chain_id: u64) -> Option<Self> {
        find_network(chain_id).cloned().map(Self::new)
    }

    pub fn required_network(&self) -> &NetworkDescriptor {
        &self.required
    }
}

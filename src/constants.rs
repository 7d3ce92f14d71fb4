// src/constants.rs

use alloy_primitives::{address, Address};

/// Counter deployment the client talks to unless configured otherwise.
pub const COUNTER_ADDRESS: Address = address!("85D259151eCC83ef98B4b124FAaa960f67Ed5e09");

/// Base mainnet.
pub const DEFAULT_CHAIN_ID: u64 = 8453;

pub const DEFAULT_ATTRIBUTION_TAG: &str = "base-counter";

pub const DEFAULT_CONFIRMATIONS: u64 = 1;
pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_STATUS_CLEAR_DELAY_MS: u64 = 3_000;

// ==================== ERC-8021 ====================

/// Schema 0: `codes || codesLength || schemaId || ercMarker`.
pub const ERC8021_SCHEMA_ID: u8 = 0x00;

/// `0x8021` repeated to 16 bytes.
pub const ERC8021_MARKER: [u8; 16] = [
    0x80, 0x21, 0x80, 0x21, 0x80, 0x21, 0x80, 0x21,
    0x80, 0x21, 0x80, 0x21, 0x80, 0x21, 0x80, 0x21,
];

// ==================== status text ====================

pub const STATUS_CONNECTING: &str = "Connecting...";
pub const STATUS_CONNECT_FAILED: &str = "Connection failed.";
pub const STATUS_CONNECT_REJECTED: &str = "Connection request rejected by user.";
pub const STATUS_INSTALL_PROVIDER: &str = "Please install a wallet such as MetaMask!";
pub const STATUS_CONNECT_FIRST: &str = "Please connect your wallet first.";
pub const STATUS_BUSY: &str = "Another wallet request is still pending.";
pub const STATUS_SWITCH_REJECTED: &str = "Network switch rejected by user.";

pub const STATUS_AWAITING_CONFIRMATION: &str = "Please confirm transaction in your wallet...";
pub const STATUS_MINING: &str = "Mining transaction... (Please wait)";
pub const STATUS_TX_SUCCESS: &str = "Transaction Successful! Updating UI...";
pub const STATUS_TX_REJECTED: &str = "Transaction rejected by user.";
pub const STATUS_TX_FAILED: &str = "Transaction failed.";

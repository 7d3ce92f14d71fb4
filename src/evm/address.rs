// src/evm/address.rs

use alloy_primitives::Address;
use serde_json::Value;
use std::str::FromStr;

/// Short form for the UI: `0x85D2...5e09`.
pub fn display_address(addr: &Address) -> String {
    let checksum = addr.to_checksum(None);
    format!("{}...{}", &checksum[..6], &checksum[checksum.len() - 4..])
}

pub fn is_zero_address(addr: &Address) -> bool {
    *addr == Address::ZERO
}

/// Accounts array from `eth_accounts` / `eth_requestAccounts`.
pub fn parse_accounts(value: &Value) -> Result<Vec<Address>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("expected an array of accounts, got {value}"))?;
    items
        .iter()
        .map(|item| {
            let s = item.as_str().ok_or_else(|| format!("account is not a string: {item}"))?;
            Address::from_str(s.trim()).map_err(|e| format!("invalid account {s}: {e}"))
        })
        .collect()
}

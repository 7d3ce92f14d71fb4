use alloy_primitives::U256;
use serde_json::Value;

/// Parses a quantity as providers send it: `0x` hex or plain decimal.
pub fn str_to_u64(input: &str) -> Result<u64, &'static str> {
    let s = input.trim();

    if s.is_empty() {
        return Err("input empty");
    }

    // hex: 0x2105
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() {
            return Err("invalid hex number");
        }
        return u64::from_str_radix(hex, 16).map_err(|_| "invalid hex number");
    }

    s.parse::<u64>().map_err(|_| "invalid decimal number")
}

/// Canonical integer form of a chain id or quantity, whatever JSON shape it arrived in.
pub fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => str_to_u64(s).ok(),
        _ => None,
    }
}

/// 8453 → "0x2105"
pub fn u64_to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Reads one big-endian ABI word.
pub fn u256_from_word(word: &[u8]) -> Option<U256> {
    if word.len() != 32 {
        return None;
    }
    U256::try_from_be_slice(word)
}

use alloy_sol_types::{decode_revert_reason, sol, Revert, SolError};

sol! {
    interface ICounter {
        event CountChanged(uint256 newCount);
        function increment() external;
        function decrement() external;
        function getCount() external view returns (uint256);
        function count() external view returns (uint256);
    }
}

/// Reason string of a reverted call, as the contract wrote it.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    match Revert::abi_decode(data, true) {
        Ok(revert) => Some(revert.reason),
        // Panic(uint256) and friends
        Err(_) => decode_revert_reason(data),
    }
}

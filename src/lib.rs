pub mod constants;
pub mod core;
pub mod dapp;
pub mod eips;
pub mod error;
pub mod evm;
pub mod rpc;
pub mod utils;

#[cfg(test)]
mod testing;

pub use crate::core::config::ClientConfig;
pub use crate::core::guard::{GuardState, Matched, NetworkGuard};
pub use crate::core::session::{OperationTicket, WalletSession};
pub use crate::core::state::{ConnectionStatus, SessionState, Status, StatusKind};
pub use crate::dapp::controller::{CounterDapp, CounterView};
pub use crate::dapp::counter::{CounterAction, CounterClient};
pub use crate::eips::eip1193::{Eip1193Provider, ProviderEvent, WalletProvider};
pub use crate::eips::eip8021::{encode_suffix, AttributionTag};
pub use crate::error::{ConfigError, ConnectError, EncodingError, NetworkError, ProviderError, TxError};
pub use crate::evm::chains::{ChainRegistry, NetworkDescriptor};
pub use crate::rpc::https::HttpProvider;

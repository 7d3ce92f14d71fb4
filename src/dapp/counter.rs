// src/dapp/counter.rs

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, SolEvent};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::constants::{
    COUNTER_ADDRESS, DEFAULT_CONFIRMATIONS, DEFAULT_RECEIPT_POLL_INTERVAL_MS, STATUS_AWAITING_CONFIRMATION,
    STATUS_CONNECT_FIRST, STATUS_INSTALL_PROVIDER, STATUS_MINING, STATUS_TX_SUCCESS,
};
use crate::core::config::ClientConfig;
use crate::core::guard::verify_network;
use crate::core::session::{OperationTicket, WalletSession};
use crate::core::state::Status;
use crate::eips::eip1193::{TransactionReceipt, TransactionRequest, WalletProvider};
use crate::eips::eip8021::AttributionTag;
use crate::error::{ConfigError, ProviderError, TxError};
use crate::evm::abi::ICounter;
use crate::evm::chains::NetworkDescriptor;
use crate::utils::num::u256_from_word;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAction {
    Increment,
    Decrement,
}

impl CounterAction {
    pub fn calldata(&self) -> Vec<u8> {
        match self {
            Self::Increment => ICounter::incrementCall {}.abi_encode(),
            Self::Decrement => ICounter::decrementCall {}.abi_encode(),
        }
    }
}

impl fmt::Display for CounterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Increment => "increment",
            Self::Decrement => "decrement",
        })
    }
}

/// Reads and writes the counter contract. Owns the local mirror of the count.
pub struct CounterClient {
    contract: Address,
    tag: AttributionTag,
    confirmations: u64,
    poll_interval: Duration,
    value: RwLock<Option<U256>>,
}

impl CounterClient {
    pub fn new(contract: Address, tag: AttributionTag) -> Self {
        Self {
            contract,
            tag,
            confirmations: DEFAULT_CONFIRMATIONS,
            poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_INTERVAL_MS),
            value: RwLock::new(None),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut client = Self::new(config.contract_address, config.attribution_tag()?);
        client.confirmations = config.confirmations;
        client.poll_interval = config.receipt_poll_interval();
        Ok(client)
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn tag(&self) -> &AttributionTag {
        &self.tag
    }

    /// Last known count; `None` until the first successful read.
    pub fn value(&self) -> Option<U256> {
        *self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, count: U256) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(count);
    }

    /// Unsigned call without attribution.
    pub fn populate_call(&self, action: CounterAction) -> TransactionRequest {
        TransactionRequest::call(self.contract, action.calldata())
    }

    /// Unsigned call with the attribution suffix appended to its data.
    pub fn build_transaction(&self, action: CounterAction) -> TransactionRequest {
        let mut tx = self.populate_call(action);
        tx.data = self.tag.attribute(&tx.data);
        tx
    }

    /// Raw `getCount()` at `latest` or at `block`.
    pub async fn call_count(&self, provider: &WalletProvider, block: Option<u64>) -> Result<U256, ProviderError> {
        let tx = TransactionRequest::call(self.contract, ICounter::getCountCall {}.abi_encode());
        let out = provider.call(&tx, block).await?;
        ICounter::getCountCall::abi_decode_returns(&out, true)
            .map(|ret| ret._0)
            .map_err(|e| ProviderError::Decode {
                method: "eth_call",
                reason: e.to_string(),
            })
    }

    /// Reads the count, refusing to read another chain's deployment.
    pub async fn read_count(&self, provider: &WalletProvider, network: &NetworkDescriptor) -> Result<U256, TxError> {
        verify_network(provider, network).await.map_err(TxError::WrongNetwork)?;
        let count = self.call_count(provider, None).await?;
        log::debug!("counter at {} reads {}", self.contract, count);
        self.store(count);
        Ok(count)
    }

    /// Sends `action` and waits for it to be mined.
    ///
    /// Once the receipt reports success the outcome is `Ok`. The value is the
    /// refreshed count, or the last known one (`None` if never read) when the
    /// refresh fails and the receipt carries no `CountChanged` log.
    pub async fn submit(&self, session: &WalletSession, action: CounterAction) -> Result<Option<U256>, TxError> {
        let Some(provider) = session.provider() else {
            session.report(Status::failure(STATUS_INSTALL_PROVIDER));
            return Err(TxError::ProviderMissing);
        };
        if session.account().is_none() {
            session.report(Status::failure(STATUS_CONNECT_FIRST));
            return Err(TxError::NoSession);
        }
        let Some(ticket) = session.begin_operation() else {
            log::warn!("{} ignored, another wallet operation is in flight", action);
            return Err(TxError::Busy);
        };
        ticket.report(Status::pending(STATUS_AWAITING_CONFIRMATION));

        match self.run_submit(session, &ticket, &provider, action).await {
            Ok(count) => {
                ticket.clear_after();
                Ok(count)
            }
            Err(e) => {
                log::warn!("{} failed: {}", action, e);
                ticket.report(Status::failure(e.status_message(&session.network().display_name)));
                Err(e)
            }
        }
    }

    async fn run_submit(
        &self,
        session: &WalletSession,
        ticket: &OperationTicket,
        provider: &WalletProvider,
        action: CounterAction,
    ) -> Result<Option<U256>, TxError> {
        session.ensure_network().await.map_err(TxError::WrongNetwork)?;
        // the account can be dropped by an event while the guard runs
        let signer = session.signer().ok_or(TxError::NoSession)?;

        let tx = self.build_transaction(action);
        let pending = signer.send_transaction(tx).await?;
        ticket.report(Status::pending(STATUS_MINING));

        let receipt = pending.wait(self.confirmations, self.poll_interval).await?;
        if !receipt.succeeded() {
            let reason = self.replay_revert(provider, pending.request(), receipt.block_number).await;
            return Err(TxError::ContractRevert(reason));
        }
        log::info!("{} confirmed: {}", action, session.network().tx_url(&pending.hash()));
        ticket.report(Status::success(STATUS_TX_SUCCESS));

        match self.read_count(provider, session.network()).await {
            Ok(count) => Ok(Some(count)),
            Err(e) => match self.count_from_receipt(&receipt) {
                Some(count) => {
                    log::warn!("refresh after {} failed ({}), using CountChanged", pending.hash(), e);
                    self.store(count);
                    Ok(Some(count))
                }
                None => {
                    log::warn!("refresh after {} failed, keeping last known count: {}", pending.hash(), e);
                    Ok(self.value())
                }
            },
        }
    }

    /// Re-executes a mined-but-reverted call at its block to recover the reason.
    async fn replay_revert(&self, provider: &WalletProvider, tx: &TransactionRequest, block: Option<u64>) -> Option<String> {
        match provider.call(tx, block).await {
            Ok(_) => None,
            Err(e) => e.revert_reason(),
        }
    }

    pub fn count_from_receipt(&self, receipt: &TransactionReceipt) -> Option<U256> {
        receipt
            .logs
            .iter()
            .filter(|log| log.address == self.contract)
            .filter(|log| log.topics.first() == Some(&ICounter::CountChanged::SIGNATURE_HASH))
            .find_map(|log| log.data.get(..32).and_then(u256_from_word))
    }
}

impl Default for CounterClient {
    fn default() -> Self {
        Self {
            contract: COUNTER_ADDRESS,
            tag: AttributionTag::default(),
            confirmations: DEFAULT_CONFIRMATIONS,
            poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_INTERVAL_MS),
            value: RwLock::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::STATUS_TX_REJECTED;
    use crate::core::state::{ConnectionStatus, StatusKind};
    use crate::eips::eip1193::ProviderEvent;
    use crate::error::NetworkError;
    use crate::eips::eip8021::parse_suffix;
    use crate::evm::chains::find_network;
    use crate::testing::{MockWallet, ALICE, FLOOR_REASON};
    use alloy_primitives::Bytes;
    use serde_json::json;

    fn base() -> NetworkDescriptor {
        find_network(8453).unwrap().clone()
    }

    fn session(wallet: &MockWallet) -> WalletSession {
        WalletSession::new(base(), Some(wallet.provider()), Duration::from_secs(3))
    }

    async fn connected(wallet: &MockWallet) -> WalletSession {
        let session = session(wallet);
        session.connect().await.unwrap();
        session
    }

    #[test]
    fn test_build_transaction_appends_suffix() {
        let client = CounterClient::default();
        let plain = client.populate_call(CounterAction::Increment);
        assert_eq!(plain.to, COUNTER_ADDRESS);
        assert_eq!(plain.data, Bytes::from(vec![0xd0u8, 0x9d, 0xe0, 0x8a]));

        let tx = client.build_transaction(CounterAction::Increment);
        let parsed = parse_suffix(&tx.data).unwrap();
        assert_eq!(parsed.calldata, &plain.data[..]);
        assert_eq!(parsed.tag, b"base-counter");
        assert_eq!(tx.data.len(), 4 + 12 + 18);
    }

    #[tokio::test]
    async fn test_read_count() {
        let wallet = MockWallet::on_chain(8453).with_count(5);
        let client = CounterClient::default();
        assert_eq!(client.value(), None);
        assert_eq!(client.read_count(&wallet.provider(), &base()).await, Ok(U256::from(5)));
        assert_eq!(client.value(), Some(U256::from(5)));
    }

    #[tokio::test]
    async fn test_read_refuses_other_chain() {
        let wallet = MockWallet::on_chain(1).with_count(5);
        let client = CounterClient::default();
        let err = client.read_count(&wallet.provider(), &base()).await.unwrap_err();
        assert!(matches!(err, TxError::WrongNetwork(_)));
        assert_eq!(wallet.count_of("eth_call"), 0);
        assert_eq!(wallet.count_of("wallet_switchEthereumChain"), 0);
        assert_eq!(client.value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_end_to_end() {
        let wallet = MockWallet::on_chain(8453).with_count(5);
        let session = connected(&wallet).await;
        let client = CounterClient::default();
        let mut statuses = session.subscribe_status();

        assert_eq!(client.submit(&session, CounterAction::Increment).await, Ok(Some(U256::from(6))));
        assert_eq!(client.value(), Some(U256::from(6)));
        assert!(!session.is_busy());

        let seen: Vec<String> = std::iter::from_fn(|| statuses.try_recv().ok()).map(|s| s.message).collect();
        assert_eq!(seen, vec![STATUS_AWAITING_CONFIRMATION, STATUS_MINING, STATUS_TX_SUCCESS]);
        assert_eq!(session.snapshot().status.kind, StatusKind::Success);

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert!(session.snapshot().status.is_idle());

        // the submitted data carries the attribution tag
        let sent = wallet.sent();
        assert_eq!(sent[0]["from"], json!(ALICE));
        let data = hex::decode(sent[0]["data"].as_str().unwrap().trim_start_matches("0x")).unwrap();
        assert_eq!(parse_suffix(&data).unwrap().tag, b"base-counter");
    }

    #[tokio::test]
    async fn test_decrement_at_floor() {
        let wallet = MockWallet::on_chain(8453);
        let session = connected(&wallet).await;
        let client = CounterClient::default();
        client.read_count(&wallet.provider(), &base()).await.unwrap();

        let err = client.submit(&session, CounterAction::Decrement).await.unwrap_err();
        assert_eq!(err, TxError::ContractRevert(Some(FLOOR_REASON.to_string())));
        assert_eq!(client.value(), Some(U256::ZERO));
        assert_eq!(session.snapshot().status, Status::failure(format!("Error: {FLOOR_REASON}")));
        assert!(!session.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mined_revert_recovers_reason() {
        let wallet = MockWallet::on_chain(8453).mined_revert();
        let session = connected(&wallet).await;
        let client = CounterClient::default();

        let err = client.submit(&session, CounterAction::Decrement).await.unwrap_err();
        assert_eq!(err, TxError::ContractRevert(Some(FLOOR_REASON.to_string())));
        assert_eq!(wallet.count(), U256::ZERO);
        assert_eq!(client.value(), None);
    }

    #[tokio::test]
    async fn test_rejected_by_user() {
        let wallet = MockWallet::on_chain(8453).with_count(2).reject_tx();
        let session = connected(&wallet).await;
        let client = CounterClient::default();

        assert_eq!(client.submit(&session, CounterAction::Decrement).await, Err(TxError::Rejected));
        assert_eq!(session.snapshot().status, Status::failure(STATUS_TX_REJECTED));
        assert!(!session.is_busy());
        assert_eq!(wallet.count(), U256::from(2));
    }

    #[tokio::test]
    async fn test_requires_session() {
        let wallet = MockWallet::on_chain(8453);
        let session = session(&wallet);
        let client = CounterClient::default();
        assert_eq!(client.submit(&session, CounterAction::Increment).await, Err(TxError::NoSession));
        assert_eq!(session.snapshot().status, Status::failure(STATUS_CONNECT_FIRST));
        assert!(wallet.sent().is_empty());

        let detached = WalletSession::new(base(), None, Duration::from_secs(3));
        assert_eq!(client.submit(&detached, CounterAction::Increment).await, Err(TxError::ProviderMissing));
    }

    #[tokio::test]
    async fn test_wrong_network_at_submit() {
        let wallet = MockWallet::on_chain(8453).with_count(1);
        let session = connected(&wallet).await;
        let client = CounterClient::default();

        // user moves to mainnet and refuses to come back
        let wallet = wallet.reject_switch();
        wallet.set_chain(1);
        let err = client.submit(&session, CounterAction::Increment).await.unwrap_err();
        assert!(matches!(err, TxError::WrongNetwork(NetworkError::SwitchRejected(_))));
        assert_eq!(session.connection(), ConnectionStatus::WrongNetwork);
        assert!(wallet.sent().is_empty());
        assert!(!session.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_falls_back_to_event() {
        let wallet = MockWallet::on_chain(8453).with_count(9);
        let session = connected(&wallet).await;
        let client = CounterClient::default();
        wallet.set_fail_calls(true);

        assert_eq!(client.submit(&session, CounterAction::Increment).await, Ok(Some(U256::from(10))));
        assert_eq!(client.value(), Some(U256::from(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mined_success_survives_failed_refresh() {
        let wallet = MockWallet::on_chain(8453).with_count(5);
        let session = connected(&wallet).await;
        // no CountChanged log from this address ever matches
        let client = CounterClient::new(Address::repeat_byte(0x11), AttributionTag::default());
        wallet.set_fail_calls(true);

        assert_eq!(client.submit(&session, CounterAction::Increment).await, Ok(None));
        assert_eq!(wallet.count(), U256::from(6));
        assert_eq!(wallet.sent().len(), 1);
        assert_eq!(session.snapshot().status, Status::success(STATUS_TX_SUCCESS));
        assert!(!session.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_last_known_count() {
        let wallet = MockWallet::on_chain(8453).with_count(5);
        let session = connected(&wallet).await;
        let client = CounterClient::new(Address::repeat_byte(0x11), AttributionTag::default());
        client.read_count(&wallet.provider(), &base()).await.unwrap();
        wallet.set_fail_calls(true);

        assert_eq!(client.submit(&session, CounterAction::Increment).await, Ok(Some(U256::from(5))));
        assert_eq!(client.value(), Some(U256::from(5)));
        assert_eq!(wallet.count(), U256::from(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_promotes_wrong_network_session() {
        let wallet = MockWallet::on_chain(1).authorized().with_count(2);
        let session = session(&wallet);
        session.probe_existing_session().await;
        // the probe asked to switch and the mock applied it
        assert_eq!(session.connection(), ConnectionStatus::Connected);

        wallet.set_chain(1);
        session.handle_event(ProviderEvent::ChainChanged(1)).await;
        assert_eq!(session.connection(), ConnectionStatus::WrongNetwork);
        assert!(session.signer().is_none());

        let client = CounterClient::default();
        assert_eq!(client.submit(&session, CounterAction::Increment).await, Ok(Some(U256::from(3))));
        assert_eq!(session.connection(), ConnectionStatus::Connected);
        assert_eq!(wallet.chain_id(), 8453);
    }

    #[tokio::test]
    async fn test_busy_rejects_second_submit() {
        let wallet = MockWallet::on_chain(8453).with_count(1);
        let session = connected(&wallet).await;
        let client = CounterClient::default();

        let ticket = session.begin_operation().unwrap();
        assert_eq!(client.submit(&session, CounterAction::Increment).await, Err(TxError::Busy));
        assert_eq!(session.connect().await, Err(crate::error::ConnectError::Busy));
        drop(ticket);
        assert!(wallet.sent().is_empty());
        assert_eq!(wallet.count(), U256::from(1));
    }
}

// src/dapp/controller.rs

use alloy_primitives::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::core::config::ClientConfig;
use crate::core::session::WalletSession;
use crate::core::state::SessionState;
use crate::dapp::counter::{CounterAction, CounterClient};
use crate::eips::eip1193::{Eip1193Provider, ProviderEvent, WalletProvider};
use crate::error::{ConfigError, ConnectError, ProviderError, TxError};
use crate::rpc::https::HttpProvider;

/// Everything the page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterView {
    pub session: SessionState,
    pub count: Option<U256>,
    pub network: String,
}

/// Owns the session and the counter; the only entry point the UI talks to.
pub struct CounterDapp {
    session: WalletSession,
    counter: CounterClient,
    read_provider: Option<WalletProvider>,
}

impl CounterDapp {
    /// `wallet` is the injected provider, `None` when the page has none.
    pub fn new(config: &ClientConfig, wallet: Option<Arc<dyn Eip1193Provider>>) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = config.registry()?;
        let provider = wallet.map(|inner| WalletProvider::new(inner).with_timeout(config.request_timeout()));
        Ok(Self {
            session: WalletSession::new(registry.required_network().clone(), provider, config.status_clear_delay()),
            counter: CounterClient::from_config(config)?,
            read_provider: None,
        })
    }

    /// Provider used for reads when no wallet is injected.
    pub fn with_read_provider(mut self, provider: Arc<dyn Eip1193Provider>) -> Self {
        self.read_provider = Some(WalletProvider::new(provider));
        self
    }

    /// Falls back to the network's public RPC endpoint for reads.
    pub fn with_public_rpc(self) -> Result<Self, ProviderError> {
        let http = HttpProvider::for_network(self.session.network())?;
        Ok(self.with_read_provider(Arc::new(http)))
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn counter(&self) -> &CounterClient {
        &self.counter
    }

    pub fn view(&self) -> CounterView {
        CounterView {
            session: self.session.snapshot(),
            count: self.counter.value(),
            network: self.session.network().display_name.clone(),
        }
    }

    /// Startup hook: silent reconnection, then a first read.
    pub async fn startup(&self) -> Option<Address> {
        let account = self.session.probe_existing_session().await;
        self.refresh_logged().await;
        account
    }

    pub async fn connect(&self) -> Result<Address, ConnectError> {
        let account = self.session.connect().await?;
        self.refresh_logged().await;
        Ok(account)
    }

    pub async fn submit(&self, action: CounterAction) -> Result<Option<U256>, TxError> {
        self.counter.submit(&self.session, action).await
    }

    pub async fn increment(&self) -> Result<Option<U256>, TxError> {
        self.submit(CounterAction::Increment).await
    }

    pub async fn decrement(&self) -> Result<Option<U256>, TxError> {
        self.submit(CounterAction::Decrement).await
    }

    pub async fn refresh(&self) -> Result<U256, TxError> {
        let provider = self
            .session
            .provider()
            .or_else(|| self.read_provider.clone())
            .ok_or(TxError::ProviderMissing)?;
        self.counter.read_count(&provider, self.session.network()).await
    }

    async fn refresh_logged(&self) {
        if let Err(e) = self.refresh().await {
            log::debug!("counter refresh skipped: {}", e);
        }
    }

    pub async fn handle_event(&self, event: ProviderEvent) {
        if self.session.handle_event(event).await {
            self.refresh_logged().await;
        }
    }

    /// Follows wallet events until the provider drops its sender.
    pub fn listen(self: Arc<Self>) -> Option<JoinHandle<()>> {
        let mut events = self.session.provider()?.events()?;
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => log::warn!("missed {} wallet events", skipped),
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }
}

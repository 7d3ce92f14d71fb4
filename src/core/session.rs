// src/core/session.rs

use alloy_primitives::Address;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

use crate::constants::{STATUS_CONNECTING, STATUS_INSTALL_PROVIDER};
use crate::core::guard::{verify_network, GuardState, Matched, NetworkGuard};
use crate::core::state::{ConnectionStatus, SessionState, Status};
use crate::eips::eip1193::{ProviderEvent, Signer, WalletProvider};
use crate::error::{ConnectError, NetworkError, ProviderError};
use crate::evm::address::display_address;
use crate::evm::chains::NetworkDescriptor;

const STATUS_CHANNEL_CAPACITY: usize = 16;

struct Shared {
    state: SessionState,
    /// Bumped on every status change so a delayed clear only removes its own status.
    status_epoch: u64,
}

fn read(shared: &RwLock<Shared>) -> RwLockReadGuard<'_, Shared> {
    shared.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(shared: &RwLock<Shared>) -> RwLockWriteGuard<'_, Shared> {
    shared.write().unwrap_or_else(PoisonError::into_inner)
}

fn publish(shared: &RwLock<Shared>, status_tx: &broadcast::Sender<Status>, status: Status) {
    {
        let mut shared = write(shared);
        shared.status_epoch += 1;
        shared.state.status = status.clone();
    }
    if !status.message.is_empty() {
        log::debug!("status: {}", status.message);
    }
    // no subscribers is fine
    let _ = status_tx.send(status);
}

struct Wallet {
    provider: WalletProvider,
    guard: Mutex<NetworkGuard>,
}

/// Account identity, connection lifecycle and the single-flight slot.
pub struct WalletSession {
    wallet: Option<Wallet>,
    network: NetworkDescriptor,
    shared: Arc<RwLock<Shared>>,
    status_tx: broadcast::Sender<Status>,
    clear_delay: Duration,
}

impl WalletSession {
    pub fn new(network: NetworkDescriptor, provider: Option<WalletProvider>, clear_delay: Duration) -> Self {
        let wallet = provider.map(|provider| Wallet {
            guard: Mutex::new(NetworkGuard::new(provider.clone(), network.clone())),
            provider,
        });
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            wallet,
            network,
            shared: Arc::new(RwLock::new(Shared {
                state: SessionState::default(),
                status_epoch: 0,
            })),
            status_tx,
            clear_delay,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        read(&self.shared).state.clone()
    }

    pub fn account(&self) -> Option<Address> {
        read(&self.shared).state.account
    }

    pub fn connection(&self) -> ConnectionStatus {
        read(&self.shared).state.connection
    }

    pub fn is_busy(&self) -> bool {
        read(&self.shared).state.is_busy
    }

    pub fn network(&self) -> &NetworkDescriptor {
        &self.network
    }

    pub fn provider(&self) -> Option<WalletProvider> {
        self.wallet.as_ref().map(|w| w.provider.clone())
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<Status> {
        self.status_tx.subscribe()
    }

    /// Status outside any operation (e.g. a fast failure before taking the slot).
    pub fn report(&self, status: Status) {
        publish(&self.shared, &self.status_tx, status);
    }

    pub async fn guard_state(&self) -> Option<GuardState> {
        let wallet = self.wallet.as_ref()?;
        Some(wallet.guard.lock().await.state().clone())
    }

    pub async fn guard_trail(&self) -> Option<Vec<GuardState>> {
        let wallet = self.wallet.as_ref()?;
        Some(wallet.guard.lock().await.trail().to_vec())
    }

    /// Takes the single in-flight slot. `None` while another operation holds it.
    pub fn begin_operation(&self) -> Option<OperationTicket> {
        let mut shared = write(&self.shared);
        if shared.state.is_busy {
            return None;
        }
        shared.state.is_busy = true;
        Some(OperationTicket {
            shared: Arc::clone(&self.shared),
            status_tx: self.status_tx.clone(),
            clear_delay: self.clear_delay,
        })
    }

    /// Silent reconnection on startup. Never prompts for accounts.
    ///
    /// An authorized account on the wrong network is kept but the session
    /// lands in `WrongNetwork` and cannot transact.
    pub async fn probe_existing_session(&self) -> Option<Address> {
        let wallet = self.wallet.as_ref()?;
        let ticket = self.begin_operation()?;
        let accounts = match wallet.provider.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                log::warn!("probing authorized accounts failed: {}", e);
                return None;
            }
        };
        let account = *accounts.first()?;

        let verdict = {
            let mut guard = wallet.guard.lock().await;
            guard.invalidate();
            guard.ensure_network().await
        };
        match verdict {
            Ok(_) => {
                ticket.update(|state| {
                    state.account = Some(account);
                    state.connection = ConnectionStatus::Connected;
                });
                log::info!("restored session for {}", display_address(&account));
            }
            Err(e) => {
                ticket.update(|state| {
                    state.account = Some(account);
                    state.connection = ConnectionStatus::WrongNetwork;
                });
                ticket.report(Status::failure(e.status_message(&self.network.display_name)));
                log::info!("restored {} on the wrong network: {}", display_address(&account), e);
            }
        }
        Some(account)
    }

    /// Interactive connect: network first, then account access.
    pub async fn connect(&self) -> Result<Address, ConnectError> {
        let Some(wallet) = self.wallet.as_ref() else {
            self.report(Status::failure(STATUS_INSTALL_PROVIDER));
            return Err(ConnectError::ProviderMissing);
        };
        let Some(ticket) = self.begin_operation() else {
            log::warn!("connect ignored, another wallet operation is in flight");
            return Err(ConnectError::Busy);
        };
        let previous = ticket.update(|state| std::mem::replace(&mut state.connection, ConnectionStatus::Connecting));
        ticket.report(Status::pending(STATUS_CONNECTING));

        match self.authorize(wallet).await {
            Ok(account) => {
                ticket.update(|state| {
                    state.account = Some(account);
                    state.connection = ConnectionStatus::Connected;
                });
                ticket.report(Status::idle());
                log::info!("connected {}", display_address(&account));
                Ok(account)
            }
            Err(e) => {
                log::warn!("connect failed: {}", e);
                ticket.update(|state| {
                    state.connection = match &e {
                        ConnectError::Network(_) if state.account.is_some() => ConnectionStatus::WrongNetwork,
                        _ => previous,
                    };
                });
                ticket.report(Status::failure(e.status_message(&self.network.display_name)));
                Err(e)
            }
        }
    }

    async fn authorize(&self, wallet: &Wallet) -> Result<Address, ConnectError> {
        {
            let mut guard = wallet.guard.lock().await;
            guard.invalidate();
            guard.ensure_network().await?;
        }
        let accounts = wallet.provider.request_accounts().await.map_err(|e| {
            if e.is_user_rejected() {
                ConnectError::Rejected
            } else {
                ConnectError::Provider(e)
            }
        })?;
        // an empty grant is a refusal in all but name
        accounts.first().copied().ok_or(ConnectError::Rejected)
    }

    /// Re-runs the guard for a new operation and updates the connection state.
    pub async fn ensure_network(&self) -> Result<Matched, NetworkError> {
        let wallet = self.wallet.as_ref().ok_or_else(|| {
            NetworkError::Unreadable(ProviderError::Transport("no wallet provider".to_string()))
        })?;
        let verdict = {
            let mut guard = wallet.guard.lock().await;
            guard.invalidate();
            guard.ensure_network().await
        };
        let mut shared = write(&self.shared);
        if shared.state.account.is_some() {
            shared.state.connection = match verdict {
                Ok(_) => ConnectionStatus::Connected,
                Err(_) => ConnectionStatus::WrongNetwork,
            };
        }
        verdict
    }

    /// Non-interactive network check.
    pub async fn check_network(&self) -> Result<Matched, NetworkError> {
        let wallet = self.wallet.as_ref().ok_or_else(|| {
            NetworkError::Unreadable(ProviderError::Transport("no wallet provider".to_string()))
        })?;
        verify_network(&wallet.provider, &self.network).await
    }

    /// Sending capability, only while connected on the required network.
    pub fn signer(&self) -> Option<Signer> {
        let wallet = self.wallet.as_ref()?;
        let state = self.snapshot();
        if state.connection != ConnectionStatus::Connected {
            return None;
        }
        Some(wallet.provider.signer(state.account?))
    }

    /// Applies a provider event. Returns true when the counter should be re-read.
    pub async fn handle_event(&self, event: ProviderEvent) -> bool {
        log::debug!("provider event: {:?}", event);
        match event {
            ProviderEvent::Disconnect => {
                self.drop_account();
                false
            }
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    self.drop_account();
                    false
                }
                Some(&account) => {
                    let mut shared = write(&self.shared);
                    // only follow a switch inside a session the user already opened
                    if shared.state.account.is_some() {
                        shared.state.account = Some(account);
                        log::info!("active account changed to {}", display_address(&account));
                    }
                    false
                }
            },
            ProviderEvent::ChainChanged(chain_id) | ProviderEvent::Connect { chain_id } => {
                if let Some(wallet) = self.wallet.as_ref() {
                    // an operation holding the guard validates on its own
                    if let Ok(mut guard) = wallet.guard.try_lock() {
                        guard.invalidate();
                    }
                }
                let on_network = self.network.matches(chain_id);
                let has_account = {
                    let mut shared = write(&self.shared);
                    if shared.state.account.is_some() && shared.state.connection != ConnectionStatus::Connecting {
                        shared.state.connection = if on_network {
                            ConnectionStatus::Connected
                        } else {
                            ConnectionStatus::WrongNetwork
                        };
                    }
                    shared.state.account.is_some() && !shared.state.is_busy
                };
                if has_account {
                    let status = if on_network {
                        Status::idle()
                    } else {
                        Status::failure(format!("Please switch your wallet to {}.", self.network.display_name))
                    };
                    self.report(status);
                }
                on_network
            }
        }
    }

    fn drop_account(&self) {
        let mut shared = write(&self.shared);
        if shared.state.account.take().is_some() {
            log::info!("wallet disconnected");
        }
        shared.state.connection = ConnectionStatus::Disconnected;
    }
}

/// Holds the single-flight slot. Dropping it clears `is_busy` on every exit path.
pub struct OperationTicket {
    shared: Arc<RwLock<Shared>>,
    status_tx: broadcast::Sender<Status>,
    clear_delay: Duration,
}

impl OperationTicket {
    pub fn report(&self, status: Status) {
        publish(&self.shared, &self.status_tx, status);
    }

    pub fn update<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        f(&mut write(&self.shared).state)
    }

    /// Clears the current status after the configured delay unless a newer one replaced it.
    pub fn clear_after(&self) {
        let epoch = read(&self.shared).status_epoch;
        let shared = Arc::clone(&self.shared);
        let status_tx = self.status_tx.clone();
        let delay = self.clear_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if read(&shared).status_epoch == epoch {
                publish(&shared, &status_tx, Status::idle());
            }
        });
    }
}

impl Drop for OperationTicket {
    fn drop(&mut self) {
        write(&self.shared).state.is_busy = false;
    }
}

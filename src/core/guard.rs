// src/core/guard.rs

use crate::eips::eip1193::WalletProvider;
use crate::error::NetworkError;
use crate::evm::chains::NetworkDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Unknown,
    Checking,
    Mismatched { current: u64 },
    SwitchRequested,
    /// Wallet answered 4902 and is being asked to register the chain.
    AddRequested,
    Matched,
    Failed,
}

/// Proof that the wallet was on the required chain when last checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matched {
    pub chain_id: u64,
}

/// Reads the wallet network and compares it without prompting anything.
pub async fn verify_network(provider: &WalletProvider, required: &NetworkDescriptor) -> Result<Matched, NetworkError> {
    let current = provider.chain_id().await.map_err(NetworkError::Unreadable)?;
    if required.matches(current) {
        Ok(Matched { chain_id: current })
    } else {
        Err(NetworkError::Mismatched {
            expected: required.chain_id,
            actual: current,
        })
    }
}

/// Drives the wallet onto the required network.
///
/// A `Matched` result is cached until [`NetworkGuard::invalidate`]; callers
/// invalidate at the start of every operation because the user can switch
/// networks in the wallet at any time.
pub struct NetworkGuard {
    provider: WalletProvider,
    required: NetworkDescriptor,
    state: GuardState,
    trail: Vec<GuardState>,
}

impl NetworkGuard {
    pub fn new(provider: WalletProvider, required: NetworkDescriptor) -> Self {
        Self {
            provider,
            required,
            state: GuardState::Unknown,
            trail: vec![GuardState::Unknown],
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// States visited by the last `ensure_network` run, starting state included.
    pub fn trail(&self) -> &[GuardState] {
        &self.trail
    }

    pub fn required(&self) -> &NetworkDescriptor {
        &self.required
    }

    pub fn invalidate(&mut self) {
        self.state = GuardState::Unknown;
    }

    pub async fn check(&self) -> Result<Matched, NetworkError> {
        verify_network(&self.provider, &self.required).await
    }

    fn enter(&mut self, next: GuardState) {
        log::debug!("network guard: {:?} -> {:?}", self.state, next);
        self.trail.push(next.clone());
        self.state = next;
    }

    fn fail(&mut self, error: NetworkError) -> Result<Matched, NetworkError> {
        log::warn!("network guard failed: {}", error);
        self.enter(GuardState::Failed);
        Err(error)
    }

    fn matched(&mut self) -> Result<Matched, NetworkError> {
        self.enter(GuardState::Matched);
        Ok(Matched {
            chain_id: self.required.chain_id,
        })
    }

    pub async fn ensure_network(&mut self) -> Result<Matched, NetworkError> {
        if self.state == GuardState::Matched {
            return Ok(Matched {
                chain_id: self.required.chain_id,
            });
        }
        self.trail = vec![self.state.clone()];
        self.enter(GuardState::Checking);

        let current = match self.provider.chain_id().await {
            Ok(current) => current,
            Err(e) => return self.fail(NetworkError::Unreadable(e)),
        };
        if self.required.matches(current) {
            return self.matched();
        }

        self.enter(GuardState::Mismatched { current });
        self.enter(GuardState::SwitchRequested);
        match self.provider.switch_chain(self.required.chain_id).await {
            Ok(()) => {}
            Err(e) if e.is_chain_not_recognized() => {
                self.enter(GuardState::AddRequested);
                if let Err(e) = self.provider.add_chain(&self.required).await {
                    return self.fail(NetworkError::RegistrationFailed(e));
                }
            }
            Err(e) if e.is_user_rejected() => return self.fail(NetworkError::SwitchRejected(e)),
            Err(e) => return self.fail(NetworkError::SwitchFailed(e)),
        }

        // single validation pass, no further retries
        match self.provider.chain_id().await {
            Ok(current) if self.required.matches(current) => self.matched(),
            Ok(current) => {
                let expected = self.required.chain_id;
                self.fail(NetworkError::Mismatched { expected, actual: current })
            }
            Err(e) => self.fail(NetworkError::Unreadable(e)),
        }
    }
}

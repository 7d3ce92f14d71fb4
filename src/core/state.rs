// src/core/state.rs

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Account known, but the wallet sits on another chain. No transactions.
    WrongNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    #[default]
    Idle,
    Pending,
    Success,
    Failure,
}

/// What the presentation layer shows: a line of text and a coarse flag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    pub message: String,
    pub kind: StatusKind,
}

impl Status {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn pending(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: StatusKind::Pending }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: StatusKind::Success }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: StatusKind::Failure }
    }

    pub fn is_failure(&self) -> bool {
        self.kind == StatusKind::Failure
    }

    pub fn is_idle(&self) -> bool {
        self.kind == StatusKind::Idle && self.message.is_empty()
    }
}

/// Snapshot of the wallet session, synced to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub account: Option<Address>,
    pub connection: ConnectionStatus,
    pub is_busy: bool,
    pub status: Status,
}

impl SessionState {
    pub fn can_transact(&self) -> bool {
        self.account.is_some() && self.connection == ConnectionStatus::Connected && !self.is_busy
    }

    pub fn status_message(&self) -> &str {
        &self.status.message
    }
}

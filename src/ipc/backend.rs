//! Login/session backend contract.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::BoxError;

/// Opaque token returned by [`SessionBackend::inhibit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InhibitToken(pub u64);

/// Event delivered by the session backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    /// The session was locked.
    Locked,
    /// The session was unlocked.
    Unlocked,
    /// The machine is about to suspend (`true`) or has resumed (`false`).
    PrepareForSleep(bool),
    /// The machine is about to power off (`true`) or the request was cancelled.
    PrepareForShutdown(bool),
}

/// Capabilities of the login/session backend.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Marks the session idle or active.
    async fn set_idle(&self, idle: bool) -> Result<(), BoxError>;

    /// Blocks idle actions until the token is released.
    async fn inhibit(&self, who: &str, why: &str) -> Result<InhibitToken, BoxError>;

    /// Releases an inhibition.
    async fn uninhibit(&self, token: InhibitToken) -> Result<(), BoxError>;

    /// Locks the session.
    async fn lock(&self) -> Result<(), BoxError>;

    /// Unlocks the session.
    async fn unlock(&self) -> Result<(), BoxError>;

    /// Switches to virtual terminal `vt`.
    async fn switch_terminal(&self, vt: u32) -> Result<(), BoxError>;
}

/// A call received by [`FakeBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    /// `set_idle(idle)`.
    SetIdle(bool),
    /// `inhibit(who, why)`.
    Inhibit {
        /// Requesting application.
        who: String,
        /// Reason given.
        why: String,
    },
    /// `uninhibit(token)`.
    Uninhibit(InhibitToken),
    /// `lock()`.
    Lock,
    /// `unlock()`.
    Unlock,
    /// `switch_terminal(vt)`.
    SwitchTerminal(u32),
}

/// Backend that accepts everything and records the calls.
///
/// Used when no real backend is present and in tests.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<BackendCall>>,
    next_token: AtomicU64,
}

impl FakeBackend {
    /// New backend with an empty call log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far, in order.
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: BackendCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn set_idle(&self, idle: bool) -> Result<(), BoxError> {
        self.record(BackendCall::SetIdle(idle)).await;
        Ok(())
    }

    async fn inhibit(&self, who: &str, why: &str) -> Result<InhibitToken, BoxError> {
        self.record(BackendCall::Inhibit {
            who: who.to_string(),
            why: why.to_string(),
        })
        .await;
        Ok(InhibitToken(self.next_token.fetch_add(1, Ordering::Relaxed) + 1))
    }

    async fn uninhibit(&self, token: InhibitToken) -> Result<(), BoxError> {
        self.record(BackendCall::Uninhibit(token)).await;
        Ok(())
    }

    async fn lock(&self) -> Result<(), BoxError> {
        self.record(BackendCall::Lock).await;
        Ok(())
    }

    async fn unlock(&self) -> Result<(), BoxError> {
        self.record(BackendCall::Unlock).await;
        Ok(())
    }

    async fn switch_terminal(&self, vt: u32) -> Result<(), BoxError> {
        self.record(BackendCall::SwitchTerminal(vt)).await;
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BackendEvent, InhibitToken, SessionBackend, SessionHandle};
use crate::error::SessionError;
use crate::events::{Bus, Event, EventKind};

/// Operations exported to IPC callers.
///
/// Session operations map 1:1 onto control-loop commands. The idle, lock,
/// inhibit and VT calls pass through to the [`SessionBackend`]. Inhibitions
/// are handed out as small integer cookies that stay stable across callers.
pub struct SessionInterface {
    handle: SessionHandle,
    backend: Arc<dyn SessionBackend>,
    bus: Bus,
    cookies: Mutex<HashMap<u32, InhibitToken>>,
    next_cookie: AtomicU32,
}

impl SessionInterface {
    /// Creates the interface for one session.
    pub fn new(handle: SessionHandle, backend: Arc<dyn SessionBackend>, bus: Bus) -> Self {
        Self {
            handle,
            backend,
            bus,
            cookies: Mutex::new(HashMap::new()),
            next_cookie: AtomicU32::new(1),
        }
    }

    /// See [`SessionHandle::load`].
    pub async fn load(&self, name: &str) -> Result<(), SessionError> {
        self.handle.load(name).await
    }

    /// See [`SessionHandle::unload`].
    pub async fn unload(&self, name: &str) -> Result<(), SessionError> {
        self.handle.unload(name).await
    }

    /// See [`SessionHandle::set_environment`].
    pub async fn set_environment(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.handle.set_environment(key, value).await
    }

    /// See [`SessionHandle::unset_environment`].
    pub async fn unset_environment(&self, key: &str) -> Result<(), SessionError> {
        self.handle.unset_environment(key).await
    }

    /// Runs a pre-split command in the session environment. See [`SessionHandle::launch_command`].
    pub async fn launch_command(&self, argv: &[&str]) -> Result<u32, SessionError> {
        self.handle.launch_command(argv.iter().copied()).await
    }

    /// Ends the session.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.handle.logout("logout requested over IPC")
    }

    /// Tells the backend whether the user is idle.
    pub async fn set_idle(&self, idle: bool) -> Result<(), SessionError> {
        self.backend
            .set_idle(idle)
            .await
            .map_err(|error| SessionError::Backend { op: "set idle", error })
    }

    /// Locks the screen.
    pub async fn lock(&self) -> Result<(), SessionError> {
        self.backend
            .lock()
            .await
            .map_err(|error| SessionError::Backend { op: "lock", error })
    }

    /// Unlocks the screen.
    pub async fn unlock(&self) -> Result<(), SessionError> {
        self.backend
            .unlock()
            .await
            .map_err(|error| SessionError::Backend { op: "unlock", error })
    }

    /// Inhibits idle actions on behalf of `who`; returns a cookie for [`uninhibit`](Self::uninhibit).
    pub async fn inhibit(&self, who: &str, why: &str) -> Result<u32, SessionError> {
        let token = self
            .backend
            .inhibit(who, why)
            .await
            .map_err(|error| SessionError::Backend { op: "inhibit", error })?;
        let cookie = self.next_cookie.fetch_add(1, Ordering::Relaxed);
        self.cookies.lock().await.insert(cookie, token);
        debug!(who, why, cookie, "idle inhibited");
        Ok(cookie)
    }

    /// Releases an inhibition. Unknown cookies are ignored.
    pub async fn uninhibit(&self, cookie: u32) -> Result<(), SessionError> {
        let Some(token) = self.cookies.lock().await.remove(&cookie) else {
            warn!(cookie, "uninhibit with unknown cookie");
            return Ok(());
        };
        self.backend
            .uninhibit(token)
            .await
            .map_err(|error| SessionError::Backend { op: "uninhibit", error })
    }

    /// Switches to virtual terminal `vt`.
    pub async fn switch_terminal(&self, vt: u32) -> Result<(), SessionError> {
        self.backend
            .switch_terminal(vt)
            .await
            .map_err(|error| SessionError::Backend { op: "switch terminal", error })
    }

    /// Number of live inhibitions.
    pub async fn inhibitions(&self) -> usize {
        self.cookies.lock().await.len()
    }

    /// Translates one backend event.
    pub async fn handle_backend_event(&self, event: BackendEvent) {
        match event {
            BackendEvent::Locked => self.bus.publish(Event::new(EventKind::SessionLocked)),
            BackendEvent::Unlocked => self.bus.publish(Event::new(EventKind::SessionUnlocked)),
            BackendEvent::PrepareForSleep(true) => {
                if let Err(e) = self.lock().await {
                    warn!(error = %e, "cannot lock before sleep");
                }
            }
            BackendEvent::PrepareForShutdown(true) => {
                if let Err(e) = self.handle.logout("system is shutting down") {
                    debug!(error = %e, "shutdown notice after session end");
                }
            }
            BackendEvent::PrepareForSleep(false) | BackendEvent::PrepareForShutdown(false) => {}
        }
    }

    /// Forwards backend events until the sender side is dropped.
    pub fn listen(self: Arc<Self>, mut events: mpsc::Receiver<BackendEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle_backend_event(event).await;
            }
        })
    }
}

//! # What a module gets at start, and how it talks back.
//!
//! ```text
//! Orchestrator ── ModuleContext { args, environment snapshot, link, bus } ──► Module::start
//! Module ── ModuleLink::{set_environment, unset_environment, request_shutdown, notify_removed}
//!        ──► control loop (queued, applied between module starts / in order)
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::{BackendMode, Command};
use crate::environment::EnvironmentMap;
use crate::error::SessionError;
use crate::events::Bus;

/// Start-time view handed to [`Module::start`](super::Module::start).
#[derive(Clone, Debug)]
pub struct ModuleContext {
    name: Arc<str>,
    args: Vec<String>,
    environment: EnvironmentMap,
    link: ModuleLink,
    bus: Bus,
    mode: BackendMode,
}

impl ModuleContext {
    pub(crate) fn new(
        link: ModuleLink,
        args: Vec<String>,
        environment: EnvironmentMap,
        bus: Bus,
        mode: BackendMode,
    ) -> Self {
        Self {
            name: Arc::clone(&link.name),
            args,
            environment,
            link,
            bus,
            mode,
        }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured start arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Session environment at the time `start` was called.
    pub fn environment(&self) -> &EnvironmentMap {
        &self.environment
    }

    /// Channel back to the orchestrator.
    pub fn link(&self) -> &ModuleLink {
        &self.link
    }

    /// Event bus (for modules that supervise processes).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Backend mode of this run.
    pub fn mode(&self) -> BackendMode {
        self.mode
    }
}

/// Requests from a module to the orchestrator.
///
/// Every call only enqueues; the control loop applies it. Fails with
/// [`SessionError::Closed`] once the session is over.
#[derive(Clone, Debug)]
pub struct ModuleLink {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Command>,
}

impl ModuleLink {
    pub(crate) fn new(name: impl Into<Arc<str>>, tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Name of the module this link belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks for `key=value` in the session environment.
    pub fn set_environment(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.send(Command::SetEnvironment {
            key: key.into(),
            value: value.into(),
        })
    }

    /// Asks for `key` to be removed from the session environment.
    pub fn unset_environment(&self, key: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::UnsetEnvironment(key.into()))
    }

    /// Asks for the whole session to end (same path as a user logout).
    pub fn request_shutdown(&self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Logout {
            reason: reason.into(),
            module: Some(self.name.to_string()),
        })
    }

    /// Reports that the module instance is going away.
    pub fn notify_removed(&self) -> Result<(), SessionError> {
        self.send(Command::Removed(self.name.to_string()))
    }

    fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.tx.send(cmd).map_err(|_| SessionError::Closed)
    }
}

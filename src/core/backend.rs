//! # Backend negotiation.
//!
//! Decides once, before initialization, whether the orchestrator runs the
//! phase loop itself (**native**) or hands module activation to an external
//! init system (**delegated**).
//!
//! ```text
//! BackendNegotiator::new(mode)
//!     │ set_mode(..)        (allowed until decided)
//!     ▼
//! decide(init_system) ──► Native
//!                    └──► Delegated   (init system present and available)
//!                    └──► BackendUnavailable
//!     │
//!     ▼
//! set_mode(..)  ──► warning, ignored
//! ```
//!
//! Every call into the init system is bounded: a manager that never answers
//! counts as unavailable (or as a failed unit job).

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::environment::EnvironmentMap;
use crate::error::{BoxError, SessionError};

/// How modules are activated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendMode {
    /// The orchestrator starts and stops modules itself.
    #[default]
    Native,
    /// An init system starts the session target unit.
    Delegated,
}

impl BackendMode {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Native => "native",
            BackendMode::Delegated => "delegated",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Init-system unit manager, consumed in delegated mode.
#[async_trait]
pub trait InitSystem: Send + Sync + 'static {
    /// True if the init system can be reached.
    async fn is_available(&self) -> bool;

    /// Loads `unit`.
    async fn load_unit(&self, unit: &str) -> Result<(), BoxError>;

    /// Starts `unit` with the given job mode (e.g. `"replace"`).
    async fn start_unit(&self, unit: &str, mode: &str) -> Result<(), BoxError>;

    /// Stops `unit` with the given job mode.
    async fn stop_unit(&self, unit: &str, mode: &str) -> Result<(), BoxError>;

    /// Replaces the manager's global environment.
    async fn set_global_environment(&self, env: &EnvironmentMap) -> Result<(), BoxError>;
}

/// Awaits one init-system call, failing it once `limit` has elapsed.
pub(crate) async fn bounded<F>(limit: Duration, call: F) -> Result<(), BoxError>
where
    F: Future<Output = Result<(), BoxError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(format!("init system did not reply within {limit:?}").into()),
    }
}

/// One-shot decision between native and delegated mode.
#[derive(Debug)]
pub struct BackendNegotiator {
    requested: BackendMode,
    decided: Option<BackendMode>,
    check_timeout: Duration,
}

impl BackendNegotiator {
    /// Creates a negotiator asking for `mode`.
    pub fn new(mode: BackendMode) -> Self {
        Self {
            requested: mode,
            decided: None,
            check_timeout: Duration::from_secs(2),
        }
    }

    /// Bounds the availability check of the init system.
    pub fn with_check_timeout(mut self, limit: Duration) -> Self {
        self.check_timeout = limit;
        self
    }

    /// The mode that was asked for.
    pub fn requested(&self) -> BackendMode {
        self.requested
    }

    /// The decided mode, once [`decide`](Self::decide) has succeeded.
    pub fn decided(&self) -> Option<BackendMode> {
        self.decided
    }

    /// Changes the requested mode. After the decision this only warns.
    ///
    /// Returns true if the change was applied.
    pub fn set_mode(&mut self, mode: BackendMode) -> bool {
        if let Some(decided) = self.decided {
            warn!(
                decided = %decided,
                requested = %mode,
                "backend mode cannot be changed after the session has started"
            );
            return false;
        }
        self.requested = mode;
        true
    }

    /// Fixes the mode. Delegated mode needs an available init system.
    ///
    /// Later calls return the decided mode unchanged.
    pub async fn decide(
        &mut self,
        init: Option<&dyn InitSystem>,
    ) -> Result<BackendMode, SessionError> {
        if let Some(decided) = self.decided {
            return Ok(decided);
        }
        if self.requested == BackendMode::Delegated {
            match init {
                None => {
                    return Err(SessionError::BackendUnavailable {
                        reason: "delegated mode requested but no init system is configured".into(),
                    });
                }
                Some(init) if !self.check(init).await => {
                    return Err(SessionError::BackendUnavailable {
                        reason: "init system is not reachable".into(),
                    });
                }
                Some(_) => {}
            }
        }
        self.decided = Some(self.requested);
        Ok(self.requested)
    }

    async fn check(&self, init: &dyn InitSystem) -> bool {
        match tokio::time::timeout(self.check_timeout, init.is_available()).await {
            Ok(available) => available,
            Err(_) => {
                warn!(timeout = ?self.check_timeout, "init system did not answer the availability check");
                false
            }
        }
    }
}

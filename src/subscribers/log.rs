//! # LogWriter: renders events as `tracing` records
//!
//! One record per event, with structured fields. Module transitions are logged
//! at `info`, failures at `warn`/`error`, noisy supervision detail at `debug`.
//!
//! ## Example output (fmt layer)
//! ```text
//!  INFO sessionvisor: starting module="shell" phase=WindowManager
//!  INFO sessionvisor: running module="shell" phase=WindowManager
//!  WARN sessionvisor: crashed module="shell" pid=4242 crash=1 status="signal: 11"
//!  INFO sessionvisor: stopping module="shell"
//!  INFO sessionvisor: stopped module="shell"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let module = e.module.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ModuleStarting => info!(target: "sessionvisor", module, phase = ?e.phase, "starting"),
            EventKind::ModuleRunning => info!(target: "sessionvisor", module, phase = ?e.phase, "running"),
            EventKind::ModuleFailed => {
                error!(target: "sessionvisor", module, phase = ?e.phase, reason, "failed")
            }
            EventKind::ModuleStopping => info!(target: "sessionvisor", module, "stopping"),
            EventKind::ModuleStopped if e.reason.is_some() => {
                warn!(target: "sessionvisor", module, reason, "stopped with error")
            }
            EventKind::ModuleStopped => info!(target: "sessionvisor", module, "stopped"),
            EventKind::ModuleRemoved => info!(target: "sessionvisor", module, "removed"),
            EventKind::ModuleRejected => warn!(target: "sessionvisor", module, reason, "plugin rejected"),
            EventKind::ProcessSpawned => {
                debug!(target: "sessionvisor", module, pid = ?e.pid, attempt = ?e.attempt, "spawned")
            }
            EventKind::SpawnRetryScheduled => warn!(
                target: "sessionvisor",
                module,
                attempt = ?e.attempt,
                delay_ms = ?e.delay_ms,
                reason,
                "spawn failed, retrying"
            ),
            EventKind::ProcessReady => info!(target: "sessionvisor", module, pid = ?e.pid, "ready"),
            EventKind::ReadinessTimedOut => warn!(
                target: "sessionvisor",
                module,
                pid = ?e.pid,
                timeout_ms = ?e.timeout_ms,
                "no readiness signal, assuming started"
            ),
            EventKind::ReadinessLost => error!(target: "sessionvisor", module, "readiness lost"),
            EventKind::ProcessExited => {
                info!(target: "sessionvisor", module, pid = ?e.pid, status = reason, "exited")
            }
            EventKind::ProcessCrashed => warn!(
                target: "sessionvisor",
                module,
                pid = ?e.pid,
                crash = ?e.attempt,
                status = reason,
                "crashed"
            ),
            EventKind::CrashBudgetExhausted => {
                error!(target: "sessionvisor", module, crashes = ?e.attempt, "crash budget exhausted")
            }
            EventKind::CommandLaunched => {
                info!(target: "sessionvisor", program = module, pid = ?e.pid, "command launched")
            }
            EventKind::CommandExited => {
                debug!(target: "sessionvisor", program = module, pid = ?e.pid, reason, "command exited")
            }
            EventKind::EnvironmentSet => {
                debug!(target: "sessionvisor", key = e.key.as_deref().unwrap_or(""), "environment set")
            }
            EventKind::EnvironmentUnset => {
                debug!(target: "sessionvisor", key = e.key.as_deref().unwrap_or(""), "environment unset")
            }
            EventKind::PropagationFailed => warn!(
                target: "sessionvisor",
                sink = e.sink.as_deref().unwrap_or("-"),
                reason,
                "environment propagation failed"
            ),
            EventKind::BackendSelected => info!(target: "sessionvisor", mode = reason, "backend selected"),
            EventKind::ShutdownRequested => {
                info!(target: "sessionvisor", module, reason, "shutdown requested")
            }
            EventKind::SessionEnded => info!(target: "sessionvisor", "session ended"),
            EventKind::SessionLocked => info!(target: "sessionvisor", "session locked"),
            EventKind::SessionUnlocked => info!(target: "sessionvisor", "session unlocked"),
            EventKind::SubscriberOverflow => {
                warn!(target: "sessionvisor", subscriber = module, reason, "subscriber dropped event")
            }
            EventKind::SubscriberPanicked => {
                error!(target: "sessionvisor", subscriber = module, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

//! # On-demand command launcher.
//!
//! Starts pre-split commands on behalf of IPC callers, inside the session
//! environment as it is at launch time, and tracks them until they exit.
//!
//! ```text
//! launch(argv, env) ──► spawn ──► CommandLaunched
//!                         └──► watcher: exit       → CommandExited
//!                                       terminate  → SIGTERM, grace, SIGKILL
//! terminate_all()   ──► newest first
//! ```
//!
//! When the session is delegated to an init system, commands run in a
//! transient `systemd-run --user --scope` bound to the session target.

use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::supervisor::terminate;
use crate::environment::EnvironmentMap;
use crate::error::ProcessError;
use crate::events::{Bus, Event, EventKind};

struct Launched {
    pid: u32,
    stop: CancellationToken,
    watcher: JoinHandle<Result<(), ProcessError>>,
}

/// Launcher for commands requested while the session runs.
pub struct ProcessLauncher {
    bus: Bus,
    grace: Duration,
    scope: Option<String>,
    children: Vec<Launched>,
}

impl ProcessLauncher {
    /// Creates a launcher; `grace` bounds SIGTERM before SIGKILL.
    pub fn new(bus: Bus, grace: Duration) -> Self {
        Self {
            bus,
            grace,
            scope: None,
            children: Vec::new(),
        }
    }

    /// Runs later commands in a scope bound to `unit` (delegated sessions).
    pub fn scoped_to(&mut self, unit: impl Into<String>) {
        self.scope = Some(unit.into());
    }

    /// Spawns `argv` with exactly `env` as its environment. Returns the pid.
    pub fn launch(&mut self, argv: &[String], env: &EnvironmentMap) -> Result<u32, ProcessError> {
        self.children.retain(|c| !c.watcher.is_finished());
        if argv.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        let argv = match &self.scope {
            Some(unit) => scoped(argv, unit),
            None => argv.to_vec(),
        };
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;

        let child = Command::new(program)
            .args(args)
            .env_clear()
            .envs(env)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::FailedToStart {
                program: program.clone(),
                attempts: 1,
                error: e.to_string(),
            })?;
        let pid = child.id().unwrap_or(0);
        let label: Arc<str> = Arc::from(program.as_str());
        self.bus.publish(
            Event::new(EventKind::CommandLaunched)
                .with_module(Arc::clone(&label))
                .with_pid(pid),
        );

        let stop = CancellationToken::new();
        let watcher = tokio::spawn(watch(
            child,
            label,
            stop.clone(),
            self.bus.clone(),
            self.grace,
        ));
        self.children.push(Launched { pid, stop, watcher });
        Ok(pid)
    }

    /// Number of launched commands still running.
    pub fn running(&self) -> usize {
        self.children
            .iter()
            .filter(|c| !c.watcher.is_finished())
            .count()
    }

    /// Terminates every tracked command, newest first.
    pub async fn terminate_all(&mut self) {
        while let Some(launched) = self.children.pop() {
            launched.stop.cancel();
            match launched.watcher.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(pid = launched.pid, error = %e, "failed to terminate command"),
                Err(e) => warn!(pid = launched.pid, error = %e, "command watcher failed"),
            }
        }
    }
}

async fn watch(
    mut child: Child,
    label: Arc<str>,
    stop: CancellationToken,
    bus: Bus,
    grace: Duration,
) -> Result<(), ProcessError> {
    let pid = child.id().unwrap_or(0);
    let reason = tokio::select! {
        _ = stop.cancelled() => {
            terminate(&mut child, grace).await?;
            "terminated with the session".to_string()
        }
        status = child.wait() => match status {
            Ok(status) => status.to_string(),
            Err(e) => format!("wait failed: {e}"),
        },
    };
    bus.publish(
        Event::new(EventKind::CommandExited)
            .with_module(label)
            .with_pid(pid)
            .with_reason(reason),
    );
    Ok(())
}

fn scoped(argv: &[String], unit: &str) -> Vec<String> {
    let head = ["systemd-run", "--user", "--scope"].map(String::from);
    let props = [
        format!("--description=Run command: {}", argv.join(" ")),
        format!("--property=After={unit}"),
        format!("--property=BindsTo={unit}"),
        "--".to_string(),
    ];
    head.into_iter()
        .chain(props)
        .chain(argv.iter().cloned())
        .collect()
}

//! # Autostart module.
//!
//! Launches the user's autostart applications once the shell is up and
//! terminates them, newest first, when the session ends. Entries arrive
//! pre-resolved (desktop-entry parsing happens elsewhere).

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Module, ModuleContext, Phase};
use crate::config::{AutostartConfig, AutostartEntry};
use crate::core::BackendMode;
use crate::error::ModuleError;
use crate::process::terminate;

/// Starts autostart entries; a failing entry is skipped, never fatal.
pub struct AutostartModule {
    cfg: AutostartConfig,
    stop_grace: Duration,
    children: Mutex<Vec<(String, Child)>>,
}

impl AutostartModule {
    /// Creates the module.
    pub fn new(cfg: AutostartConfig, stop_grace: Duration) -> Self {
        Self {
            cfg,
            stop_grace,
            children: Mutex::new(Vec::new()),
        }
    }

    /// Number of applications currently tracked.
    pub async fn running(&self) -> usize {
        self.children.lock().await.len()
    }
}

fn should_launch(entry: &AutostartEntry, mode: BackendMode) -> bool {
    if entry.hidden {
        return false;
    }
    !(entry.hidden_under_init && mode == BackendMode::Delegated)
}

#[async_trait]
impl Module for AutostartModule {
    fn phase(&self) -> Phase {
        Phase::Applications
    }

    async fn start(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        let mut children = self.children.lock().await;
        for entry in &self.cfg.entries {
            if !should_launch(entry, ctx.mode()) {
                debug!(entry = %entry.name, "autostart entry skipped");
                continue;
            }
            let Some((program, args)) = entry.exec.split_first() else {
                warn!(entry = %entry.name, "autostart entry has no command");
                continue;
            };
            match Command::new(program)
                .args(args)
                .env_clear()
                .envs(ctx.environment())
                .spawn()
            {
                Ok(child) => children.push((entry.name.clone(), child)),
                Err(e) => warn!(entry = %entry.name, error = %e, "failed to start autostart entry"),
            }
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        let mut children = std::mem::take(&mut *self.children.lock().await);
        let mut failed = Vec::new();
        while let Some((name, mut child)) = children.pop() {
            if let Err(e) = terminate(&mut child, self.stop_grace).await {
                warn!(entry = %name, error = %e, "failed to terminate autostart entry");
                failed.push(name);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ModuleError::stop(format!("could not terminate: {}", failed.join(", "))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hidden: bool, hidden_under_init: bool) -> AutostartEntry {
        AutostartEntry {
            name: "e".into(),
            exec: vec!["/bin/true".into()],
            hidden,
            hidden_under_init,
        }
    }

    #[test]
    fn hidden_entries_are_never_launched() {
        assert!(!should_launch(&entry(true, false), BackendMode::Native));
        assert!(should_launch(&entry(false, false), BackendMode::Delegated));
    }

    #[test]
    fn init_provided_entries_are_skipped_only_when_delegated() {
        assert!(should_launch(&entry(false, true), BackendMode::Native));
        assert!(!should_launch(&entry(false, true), BackendMode::Delegated));
    }
}

//! # Process module.
//!
//! Runs one external program (typically the shell/compositor, or a service
//! described by an on-disk manifest) under a [`ProcessSupervisor`].
//!
//! ## Rules
//! - `start` resolves after readiness (or the readiness timeout).
//! - Variables listed in `remove_env` never reach the program.
//! - A fatal supervision notice becomes a session shutdown request.
//! - Environment changes are picked up by the next relaunch.

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use super::{Module, ModuleContext, Phase};
use crate::config::ProcessConfig;
use crate::environment::EnvironmentMap;
use crate::error::ModuleError;
use crate::process::{LaunchSpec, ProcessSupervisor, ReadinessLatch, Supervision, watch_path};

struct Running {
    supervisor: ProcessSupervisor,
    probe: Option<JoinHandle<()>>,
    escalation: JoinHandle<()>,
}

/// Module backed by a supervised external program.
pub struct ProcessModule {
    cfg: ProcessConfig,
    supervision: Supervision,
    env: watch::Sender<EnvironmentMap>,
    running: Mutex<Option<Running>>,
}

impl ProcessModule {
    /// Creates the module.
    pub fn new(cfg: ProcessConfig, supervision: Supervision) -> Self {
        let (env, _rx) = watch::channel(EnvironmentMap::new());
        Self {
            cfg,
            supervision,
            env,
            running: Mutex::new(None),
        }
    }

    /// Pid of the supervised program, if running.
    pub async fn pid(&self) -> Option<u32> {
        self.running
            .lock()
            .await
            .as_ref()
            .and_then(|r| r.supervisor.pid())
    }

    fn child_environment(&self, env: &EnvironmentMap) -> EnvironmentMap {
        env.iter()
            .filter(|(k, _)| !self.cfg.remove_env.iter().any(|r| r == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[async_trait]
impl Module for ProcessModule {
    fn phase(&self) -> Phase {
        self.cfg.phase
    }

    async fn start(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }
        self.env.send_replace(self.child_environment(ctx.environment()));

        let mut spec = LaunchSpec::new(ctx.name(), self.cfg.program.as_str())
            .with_args(self.cfg.args.iter().chain(ctx.args()).cloned())
            .with_env_source(self.env.subscribe())
            .with_supervision(self.supervision);

        let mut probe = None;
        if let Some(path) = &self.cfg.readiness {
            let latch = ReadinessLatch::new();
            probe = Some(watch_path(path.clone(), latch.clone()));
            spec = spec.with_readiness(latch);
        }

        let (tx, mut failures) = mpsc::unbounded_channel();
        let supervisor = ProcessSupervisor::new(spec, ctx.bus().clone(), tx);
        if let Err(e) = supervisor.launch().await {
            if let Some(probe) = probe {
                probe.abort();
            }
            return Err(e.into());
        }

        let link = ctx.link().clone();
        let escalation = tokio::spawn(async move {
            if let Some(failure) = failures.recv().await {
                let _ = link.request_shutdown(failure.to_string());
            }
        });

        *running = Some(Running {
            supervisor,
            probe,
            escalation,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };
        let result = running.supervisor.stop().await;
        if let Some(probe) = running.probe {
            probe.abort();
        }
        running.escalation.abort();
        result.map_err(ModuleError::from)
    }

    fn environment_changed(&self, env: &EnvironmentMap) {
        self.env.send_replace(self.child_environment(env));
    }
}

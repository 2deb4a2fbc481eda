#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sessionvisor::{
    BoxError, EnvironmentMap, EnvironmentSink, InitSystem, Module, ModuleContext, ModuleError,
    ModuleRef, Orchestrator, OrchestratorBuilder, Phase, PluginCandidate, PluginRegistry,
    SessionConfig,
};

/// Ordered log shared by every fixture of one test.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.lines().iter().filter(|l| l.as_str() == line).count()
    }
}

/// What a scripted module does when started.
#[derive(Clone, Default)]
pub enum OnStart {
    #[default]
    Succeed,
    Fail,
    SetEnv(&'static str, &'static str),
    RequestShutdown(&'static str),
    NotifyRemoved,
    /// Records the value of a variable in the start snapshot.
    Observe(&'static str),
}

/// What a scripted module does when stopped.
#[derive(Clone, Default)]
pub enum OnStop {
    #[default]
    Succeed,
    Fail(&'static str),
    /// Never returns.
    Hang,
}

pub struct Scripted {
    name: &'static str,
    phase: Phase,
    on_start: OnStart,
    on_stop: OnStop,
    trace: Trace,
}

impl Scripted {
    pub fn arc(name: &'static str, phase: Phase, trace: &Trace) -> ModuleRef {
        Self::with(name, phase, OnStart::Succeed, trace)
    }

    pub fn with(name: &'static str, phase: Phase, on_start: OnStart, trace: &Trace) -> ModuleRef {
        Arc::new(Self {
            name,
            phase,
            on_start,
            on_stop: OnStop::Succeed,
            trace: trace.clone(),
        })
    }

    pub fn stopping(name: &'static str, phase: Phase, on_stop: OnStop, trace: &Trace) -> ModuleRef {
        Arc::new(Self {
            name,
            phase,
            on_start: OnStart::Succeed,
            on_stop,
            trace: trace.clone(),
        })
    }
}

#[async_trait]
impl Module for Scripted {
    fn phase(&self) -> Phase {
        self.phase
    }

    async fn start(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        self.trace.push(format!("start:{}", self.name));
        let link = ctx.link();
        match &self.on_start {
            OnStart::Succeed => Ok(()),
            OnStart::Fail => Err(ModuleError::start("scripted failure")),
            OnStart::SetEnv(k, v) => link
                .set_environment(*k, *v)
                .map_err(|e| ModuleError::start(e.to_string())),
            OnStart::RequestShutdown(reason) => link
                .request_shutdown(*reason)
                .map_err(|e| ModuleError::start(e.to_string())),
            OnStart::NotifyRemoved => link
                .notify_removed()
                .map_err(|e| ModuleError::start(e.to_string())),
            OnStart::Observe(key) => {
                let seen = ctx.environment().get(*key).cloned().unwrap_or_default();
                self.trace.push(format!("saw:{}:{key}={seen}", self.name));
                Ok(())
            }
        }
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        self.trace.push(format!("stop:{}", self.name));
        match &self.on_stop {
            OnStop::Succeed => Ok(()),
            OnStop::Fail(reason) => Err(ModuleError::stop(*reason)),
            OnStop::Hang => futures::future::pending().await,
        }
    }

    fn environment_changed(&self, _env: &EnvironmentMap) {
        self.trace.push(format!("env:{}", self.name));
    }
}

/// Sink keeping every map it receives.
#[derive(Default)]
pub struct RecordingSink {
    pushes: Mutex<Vec<EnvironmentMap>>,
}

impl RecordingSink {
    pub fn pushes(&self) -> Vec<EnvironmentMap> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnvironmentSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn push(&self, env: &EnvironmentMap) -> Result<(), BoxError> {
        self.pushes.lock().unwrap().push(env.clone());
        Ok(())
    }
}

/// Init system recording unit and environment calls.
pub struct FakeInit {
    pub available: bool,
    pub trace: Trace,
}

#[async_trait]
impl InitSystem for FakeInit {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn load_unit(&self, unit: &str) -> Result<(), BoxError> {
        self.trace.push(format!("load_unit:{unit}"));
        Ok(())
    }

    async fn start_unit(&self, unit: &str, mode: &str) -> Result<(), BoxError> {
        self.trace.push(format!("start_unit:{unit}:{mode}"));
        Ok(())
    }

    async fn stop_unit(&self, unit: &str, mode: &str) -> Result<(), BoxError> {
        self.trace.push(format!("stop_unit:{unit}:{mode}"));
        Ok(())
    }

    async fn set_global_environment(&self, _env: &EnvironmentMap) -> Result<(), BoxError> {
        self.trace.push("set_global_environment");
        Ok(())
    }
}

/// Session registry with the given modules, all autoloaded.
pub fn registry(modules: Vec<(&'static str, ModuleRef)>) -> PluginRegistry {
    modules
        .into_iter()
        .fold(PluginRegistry::new("SessionModule"), |r, (id, m)| r.with_builtin(id, m))
}

/// Session-kind candidate started only on demand.
pub fn on_demand(id: &str, module: ModuleRef) -> PluginCandidate {
    PluginCandidate::builtin(id, "SessionModule", module).with_metadata("autoload", false)
}

/// Builder with an empty environment, so tests do not see the host's variables.
pub fn builder(cfg: SessionConfig, registry: PluginRegistry) -> OrchestratorBuilder {
    Orchestrator::builder(cfg)
        .with_registry(registry)
        .with_environment(EnvironmentMap::new())
}

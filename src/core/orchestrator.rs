//! # Orchestrator: phase-ordered module lifecycle.
//!
//! The [`Orchestrator`] owns every module's state, the session environment and
//! the backend decision. All mutation happens on the task that drives it;
//! everything else talks to it through [`Command`]s.
//!
//! ## Startup (native mode)
//! ```text
//! initialize():
//!   negotiator.decide(init) ──► BackendSelected
//!   registry.discover()     ──► ModuleRejected per bad candidate
//!   per plugin: Discovered → Registered → Pending (autoload) | Rejected (disabled)
//!
//! start():
//!   environment.resync()
//!   for module in Pending, sorted by (phase, discovery order):
//!     drain requests (env changes applied, load/unload deferred, logout aborts)
//!     Pending → Starting ── start(ctx) ──┬─ Ok  → Running, loaded.push(name)
//!                                        └─ Err → Failed, shutdown(), StartupFailed
//!   replay deferred requests
//! ```
//!
//! ## Startup (delegated mode)
//! ```text
//! init.load_unit(target) → init.start_unit(target, "replace")   (phase loop skipped)
//! ```
//!
//! ## Shutdown
//! ```text
//! launcher.terminate_all()   (commands started on request, newest first)
//! for name in loaded.rev():  Running → Stopping ── stop() (bounded by grace) ──► Stopped
//! SessionEnded
//! ```
//!
//! ## Rules
//! - Every state change is checked against [`State::can_advance_to`]; illegal ones are logged, not applied.
//! - Shutdown order is the reverse of the load order, whatever the phases.
//! - Shutdown is idempotent.
//! - A module failure during startup is never contained: the whole session stops.
//! - Environment changes reach running modules through `environment_changed`.

use std::collections::{BTreeSet, VecDeque};
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::backend::{BackendMode, BackendNegotiator, InitSystem, bounded};
use super::builder::OrchestratorBuilder;
use super::command::Command;
use super::state::State;
use crate::config::SessionConfig;
use crate::environment::{EnvironmentMap, EnvironmentStore, InitSystemSink};
use crate::error::{ModuleError, SessionError};
use crate::events::{Bus, Event, EventKind};
use crate::ipc::SessionHandle;
use crate::modules::{ModuleContext, ModuleLink, ModuleRef, Phase};
use crate::process::ProcessLauncher;
use crate::registry::PluginRegistry;
use crate::subscribers::SubscriberSet;

/// Job mode used for the delegated target unit.
const UNIT_JOB_MODE: &str = "replace";

/// Services provided by init-system units when running delegated.
const DELEGATED_DISABLED: [&str; 2] = ["services", "shell"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Initialized,
    Starting,
    Running,
    ShuttingDown,
    Ended,
}

struct ModuleEntry {
    name: Arc<str>,
    module: ModuleRef,
    phase: Phase,
    autoload: bool,
    state: State,
}

/// Session orchestrator.
///
/// Build it with [`Orchestrator::builder`], then either call
/// [`run`](Self::run) or drive [`initialize`](Self::initialize),
/// [`start`](Self::start) and [`shutdown`](Self::shutdown) yourself.
pub struct Orchestrator {
    cfg: SessionConfig,
    bus: Bus,
    registry: PluginRegistry,
    entries: Vec<ModuleEntry>,
    loaded: Vec<Arc<str>>,
    environment: EnvironmentStore,
    negotiator: BackendNegotiator,
    init: Option<Arc<dyn InitSystem>>,
    disabled: BTreeSet<String>,
    tx: mpsc::UnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
    lifecycle: Lifecycle,
    deferred: VecDeque<Command>,
    abort: Option<String>,
    unit_started: bool,
    launcher: ProcessLauncher,
    subscribers: Option<(Arc<SubscriberSet>, JoinHandle<()>)>,
}

impl Orchestrator {
    /// Returns a builder.
    pub fn builder(cfg: SessionConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SessionConfig,
        bus: Bus,
        registry: PluginRegistry,
        environment: EnvironmentStore,
        init: Option<Arc<dyn InitSystem>>,
        subscribers: Option<(Arc<SubscriberSet>, JoinHandle<()>)>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let disabled = cfg.disabled_modules.iter().cloned().collect();
        Self {
            negotiator: BackendNegotiator::new(cfg.mode).with_check_timeout(cfg.sink_timeout),
            launcher: ProcessLauncher::new(bus.clone(), cfg.stop_grace),
            cfg,
            bus,
            registry,
            entries: Vec::new(),
            loaded: Vec::new(),
            environment,
            init,
            disabled,
            tx,
            rx,
            lifecycle: Lifecycle::Created,
            deferred: VecDeque::new(),
            abort: None,
            unit_started: false,
            subscribers,
        }
    }

    // ---- accessors ----

    /// Handle for enqueuing requests from other tasks.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.tx.clone())
    }

    /// Event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Session environment.
    pub fn environment(&self) -> &EnvironmentStore {
        &self.environment
    }

    /// Plugin registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Current state of `name`.
    pub fn state(&self, name: &str) -> Option<State> {
        self.entry(name).map(|i| self.entries[i].state)
    }

    /// Phase of `name`.
    pub fn phase(&self, name: &str) -> Option<Phase> {
        self.entry(name).map(|i| self.entries[i].phase)
    }

    /// Loaded modules, in load order.
    pub fn loaded(&self) -> Vec<&str> {
        self.loaded.iter().map(|n| n.as_ref()).collect()
    }

    /// The decided backend mode (after [`initialize`](Self::initialize)).
    pub fn mode(&self) -> Option<BackendMode> {
        self.negotiator.decided()
    }

    /// Requests another backend mode. Ignored (with a warning) once decided.
    pub fn set_mode(&mut self, mode: BackendMode) -> bool {
        self.negotiator.set_mode(mode)
    }

    /// True once shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::ShuttingDown | Lifecycle::Ended)
    }

    // ---- lifecycle ----

    /// Decides the backend, discovers plugins and registers modules.
    ///
    /// Calling it again is a no-op.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        if self.lifecycle != Lifecycle::Created {
            return Ok(());
        }

        let mode = self.negotiator.decide(self.init.as_deref()).await?;
        self.bus
            .publish(Event::new(EventKind::BackendSelected).with_reason(mode.as_str()));

        if mode == BackendMode::Delegated {
            self.launcher.scoped_to(self.cfg.target_unit.as_str());
            self.disabled
                .extend(DELEGATED_DISABLED.iter().map(|s| s.to_string()));
            if let Some(init) = &self.init {
                self.environment
                    .add_sink(Arc::new(InitSystemSink::new(Arc::clone(init))));
            }
        }

        for rejection in self.registry.discover() {
            let mut ev = Event::new(EventKind::ModuleRejected)
                .with_reason(rejection.error.to_string());
            if let Some(id) = &rejection.id {
                ev = ev.with_module(id.as_str());
            }
            self.bus.publish(ev);
        }

        for plugin in self.registry.plugins() {
            self.entries.push(ModuleEntry {
                name: Arc::from(plugin.name.as_str()),
                phase: plugin.instance.phase(),
                module: Arc::clone(&plugin.instance),
                autoload: plugin.autoload,
                state: State::Discovered,
            });
        }
        for idx in 0..self.entries.len() {
            self.advance(idx, State::Registered);
            if self.disabled.contains(self.entries[idx].name.as_ref()) {
                self.advance(idx, State::Rejected);
                self.bus.publish(
                    Event::new(EventKind::ModuleRejected)
                        .with_module(Arc::clone(&self.entries[idx].name))
                        .with_reason("disabled"),
                );
            } else if self.entries[idx].autoload {
                self.advance(idx, State::Pending);
            }
        }

        self.lifecycle = Lifecycle::Initialized;
        Ok(())
    }

    /// Starts the session.
    ///
    /// On failure every module already running has been stopped, in reverse
    /// load order, before the error is returned.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        match self.lifecycle {
            Lifecycle::Created => return Err(SessionError::NotInitialized),
            Lifecycle::Initialized => {}
            _ => return Err(SessionError::AlreadyStarted),
        }
        self.lifecycle = Lifecycle::Starting;
        self.environment.resync().await;

        if self.mode() == Some(BackendMode::Delegated) {
            if let Err(e) = self.start_target_unit().await {
                self.shutdown().await;
                return Err(e);
            }
        } else {
            let mut order: Vec<usize> = (0..self.entries.len())
                .filter(|&i| self.entries[i].state == State::Pending)
                .collect();
            order.sort_by_key(|&i| self.entries[i].phase);

            for idx in order {
                self.drain_during_startup().await;
                if let Some(reason) = self.abort.take() {
                    self.shutdown().await;
                    return Err(SessionError::StartupAborted { reason });
                }
                // Removed while waiting for its turn.
                if self.entries[idx].state != State::Pending {
                    continue;
                }
                if let Err(source) = self.start_module(idx).await {
                    let module = self.entries[idx].name.to_string();
                    self.shutdown().await;
                    return Err(SessionError::StartupFailed { module, source });
                }
            }
        }

        self.drain_during_startup().await;
        if let Some(reason) = self.abort.take() {
            self.shutdown().await;
            return Err(SessionError::StartupAborted { reason });
        }
        self.lifecycle = Lifecycle::Running;

        while let Some(cmd) = self.deferred.pop_front() {
            if self.apply(cmd).await.is_break() {
                self.shutdown().await;
                break;
            }
        }
        Ok(())
    }

    /// Stops every loaded module in reverse load order. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.is_shutting_down() {
            return;
        }
        self.lifecycle = Lifecycle::ShuttingDown;

        if self.unit_started {
            if let Some(init) = &self.init {
                let limit = self.cfg.sink_timeout;
                let stop = init.stop_unit(&self.cfg.target_unit, UNIT_JOB_MODE);
                if let Err(e) = bounded(limit, stop).await {
                    warn!(unit = %self.cfg.target_unit, error = %e, "failed to stop session target");
                }
            }
            self.unit_started = false;
        }

        self.launcher.terminate_all().await;

        while let Some(name) = self.loaded.pop() {
            if let Some(idx) = self.entry(&name) {
                self.stop_module(idx).await;
            }
        }

        self.lifecycle = Lifecycle::Ended;
        self.bus.publish(Event::new(EventKind::SessionEnded));
    }

    /// Initializes, starts, serves requests until logout, then shuts down.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let result = self.run_inner().await;
        self.shutdown().await;
        self.close_subscribers().await;
        result
    }

    async fn run_inner(&mut self) -> Result<(), SessionError> {
        self.initialize().await?;
        self.start().await?;
        while !self.is_shutting_down() {
            let Some(cmd) = self.rx.recv().await else {
                break;
            };
            if self.apply(cmd).await.is_break() {
                break;
            }
        }
        Ok(())
    }

    // ---- on-demand ----

    /// Starts a module that is not running.
    ///
    /// No-op if the module is disabled or already loaded, or if shutdown has
    /// begun. A name that is not known at all is logged as an error.
    pub async fn load(&mut self, name: &str) {
        if self.is_shutting_down() {
            debug!(module = name, "load ignored during shutdown");
            return;
        }
        let Some(idx) = self.entry(name) else {
            error!(module = name, "cannot find module");
            return;
        };
        match self.entries[idx].state {
            State::Registered | State::Stopped => {}
            State::Rejected => {
                debug!(module = name, "module is disabled");
                return;
            }
            other => {
                debug!(module = name, state = %other, "module not loadable");
                return;
            }
        }
        if self.advance(idx, State::Pending) {
            // Failure is reported through ModuleFailed; it does not end the session.
            let _ = self.start_module(idx).await;
        }
    }

    /// Stops a loaded module. No-op if it is not loaded or shutdown has begun.
    pub async fn unload(&mut self, name: &str) {
        if self.is_shutting_down() {
            debug!(module = name, "unload ignored during shutdown");
            return;
        }
        let Some(pos) = self.loaded.iter().position(|n| n.as_ref() == name) else {
            debug!(module = name, "module is not loaded");
            return;
        };
        self.loaded.remove(pos);
        if let Some(idx) = self.entry(name) {
            self.stop_module(idx).await;
        }
    }

    // ---- launcher ----

    /// Starts `argv` inside the current session environment. Returns the pid.
    ///
    /// Launched commands are terminated, newest first, when the session ends.
    pub fn launch_command(&mut self, argv: &[String]) -> Result<u32, SessionError> {
        if self.is_shutting_down() {
            return Err(SessionError::Closed);
        }
        let env = self.environment.snapshot();
        self.launcher.launch(argv, &env).map_err(SessionError::Launch)
    }

    /// Number of launched commands still running.
    pub fn launched(&self) -> usize {
        self.launcher.running()
    }

    // ---- environment ----

    /// Sets a session variable, propagates it and notifies running modules.
    pub async fn set_environment(&mut self, key: &str, value: &str) {
        self.environment.set(key, value).await;
        self.notify_environment();
    }

    /// Removes a session variable, propagates it and notifies running modules.
    pub async fn unset_environment(&mut self, key: &str) {
        self.environment.unset(key).await;
        self.notify_environment();
    }

    fn notify_environment(&self) {
        let env: &EnvironmentMap = self.environment.as_map();
        for entry in self.entries.iter().filter(|e| e.state == State::Running) {
            entry.module.environment_changed(env);
        }
    }

    // ---- internals ----

    fn entry(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name.as_ref() == name)
    }

    fn advance(&mut self, idx: usize, next: State) -> bool {
        let entry = &mut self.entries[idx];
        if !entry.state.can_advance_to(next) {
            warn!(
                module = %entry.name,
                from = %entry.state,
                to = %next,
                "illegal module state transition"
            );
            return false;
        }
        entry.state = next;
        true
    }

    fn module_event(&self, kind: EventKind, idx: usize) -> Event {
        let entry = &self.entries[idx];
        Event::new(kind)
            .with_module(Arc::clone(&entry.name))
            .with_phase(entry.phase)
    }

    async fn start_module(&mut self, idx: usize) -> Result<(), ModuleError> {
        if !self.advance(idx, State::Starting) {
            return Err(ModuleError::start(format!(
                "module is {}, not pending",
                self.entries[idx].state
            )));
        }
        self.bus.publish(self.module_event(EventKind::ModuleStarting, idx));

        let name = Arc::clone(&self.entries[idx].name);
        let ctx = ModuleContext::new(
            ModuleLink::new(Arc::clone(&name), self.tx.clone()),
            self.cfg.args_for(&name),
            self.environment.snapshot(),
            self.bus.clone(),
            self.mode().unwrap_or_default(),
        );
        let module = Arc::clone(&self.entries[idx].module);

        match module.start(ctx).await {
            Ok(()) => {
                self.advance(idx, State::Running);
                self.loaded.push(name);
                self.bus.publish(self.module_event(EventKind::ModuleRunning, idx));
                Ok(())
            }
            Err(e) => {
                self.advance(idx, State::Failed);
                self.bus.publish(
                    self.module_event(EventKind::ModuleFailed, idx)
                        .with_reason(e.as_message()),
                );
                Err(e)
            }
        }
    }

    async fn stop_module(&mut self, idx: usize) {
        if !self.advance(idx, State::Stopping) {
            return;
        }
        self.bus.publish(self.module_event(EventKind::ModuleStopping, idx));

        let module = Arc::clone(&self.entries[idx].module);
        let outcome = match tokio::time::timeout(self.cfg.grace, module.stop()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.as_message()),
            Err(_) => Some(format!("stop did not finish within {:?}", self.cfg.grace)),
        };

        self.advance(idx, State::Stopped);
        let mut ev = self.module_event(EventKind::ModuleStopped, idx);
        if let Some(reason) = outcome {
            ev = ev.with_reason(reason);
        }
        self.bus.publish(ev);
    }

    async fn start_target_unit(&mut self) -> Result<(), SessionError> {
        let Some(init) = self.init.clone() else {
            return Err(SessionError::BackendUnavailable {
                reason: "init system went away".into(),
            });
        };
        let unit = self.cfg.target_unit.clone();
        let limit = self.cfg.sink_timeout;
        if let Err(e) = bounded(limit, init.load_unit(&unit)).await {
            warn!(unit = %unit, error = %e, "failed to load session target");
            return Err(SessionError::UnitFailed { unit });
        }
        if let Err(e) = bounded(limit, init.start_unit(&unit, UNIT_JOB_MODE)).await {
            warn!(unit = %unit, error = %e, "failed to start session target");
            return Err(SessionError::UnitFailed { unit });
        }
        self.unit_started = true;
        Ok(())
    }

    /// Applies queued module requests between two module starts.
    async fn drain_during_startup(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                Command::SetEnvironment { .. }
                | Command::UnsetEnvironment(_)
                | Command::Removed(_) => {
                    let _ = self.apply(cmd).await;
                }
                Command::Logout { reason, module } => {
                    self.publish_shutdown_request(&reason, module.as_deref());
                    self.abort.get_or_insert(reason);
                }
                other => self.deferred.push_back(other),
            }
        }
    }

    async fn apply(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::Load(name) => self.load(&name).await,
            Command::Unload(name) => self.unload(&name).await,
            Command::SetEnvironment { key, value } => self.set_environment(&key, &value).await,
            Command::UnsetEnvironment(key) => self.unset_environment(&key).await,
            Command::Removed(name) => self.remove(&name),
            Command::Launch { argv, reply } => {
                let result = self.launch_command(&argv);
                if let Err(e) = &result {
                    warn!(command = ?argv, error = %e, "launch failed");
                }
                let _ = reply.send(result);
            }
            Command::Sync(ack) => {
                let _ = ack.send(());
            }
            Command::Logout { reason, module } => {
                self.publish_shutdown_request(&reason, module.as_deref());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn publish_shutdown_request(&self, reason: &str, module: Option<&str>) {
        let mut ev = Event::new(EventKind::ShutdownRequested).with_reason(reason);
        if let Some(module) = module {
            ev = ev.with_module(module);
        }
        self.bus.publish(ev);
    }

    /// Drops a module whose instance went away from every tracked list.
    fn remove(&mut self, name: &str) {
        let Some(idx) = self.entry(name) else {
            return;
        };
        self.loaded.retain(|n| n.as_ref() != name);
        if self.advance(idx, State::Removed) {
            self.bus
                .publish(Event::new(EventKind::ModuleRemoved).with_module(name));
        }
    }

    async fn close_subscribers(&mut self) {
        let Some((set, listener)) = self.subscribers.take() else {
            return;
        };
        if tokio::time::timeout(self.cfg.grace, listener).await.is_err() {
            warn!("event listener did not drain in time");
        }
        if let Ok(set) = Arc::try_unwrap(set) {
            set.shutdown().await;
        }
    }
}

//! # sessionvisor
//!
//! **Sessionvisor** brings up and tears down a desktop user session.
//!
//! It discovers pluggable *modules* (locale, autostart applications,
//! background services, the shell/compositor), starts them in phase order,
//! supervises the external programs some of them launch, and keeps every
//! consumer of the session environment in sync.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   built-in modules     *.toml manifests
//!          └──────┬──────────┘
//!                 ▼
//!          ┌──────────────┐  validated plugins  ┌──────────────────────────────────┐
//!          │PluginRegistry├────────────────────►│  Orchestrator (control loop)     │
//!          └──────────────┘                     │  - BackendNegotiator             │
//!                                               │  - EnvironmentStore ──► sinks    │
//!  SessionInterface ─┐                          │  - module table (State per name) │
//!  SessionControl  ──┼─► SessionHandle ─────────►  Command queue                   │
//!  OS signals      ──┘        ▲                 └──────┬───────────────────┬───────┘
//!                             │ ModuleLink             │ start / stop      │ publish
//!                             │                        ▼                   ▼
//!                     ┌───────┴───────────────────────────────┐   ┌────────────────┐
//!                     │ Module (EarlyInit → Init → WM → Apps) │   │ Bus (broadcast)│
//!                     │   ProcessModule ──► ProcessSupervisor │   └───────┬────────┘
//!                     └───────────────────────────────────────┘           ▼
//!                                                                 SubscriberSet
//!                                                                 (LogWriter, ...)
//! ```
//!
//! ### Lifecycle
//! ```text
//! initialize():  decide backend ─► discover plugins ─► Registered / Pending / Rejected
//! start():       native:    Pending modules by phase ─► Starting ─► Running (or roll back)
//!                delegated: init.load_unit(target) ─► init.start_unit(target)
//! run loop:      Load / Unload / SetEnvironment / UnsetEnvironment / Launch / Removed / Logout
//! shutdown():    launched commands ─► loaded modules in reverse load order ─► SessionEnded
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                              |
//! |-------------------|----------------------------------------------------------------|-------------------------------------------------|
//! | **Orchestration** | Phase-ordered start, reverse stop, rollback, on-demand load.   | [`Orchestrator`], [`State`], [`Phase`]          |
//! | **Modules**       | Capability interface and built-in modules.                     | [`Module`], [`ModuleFn`], [`ProcessModule`]     |
//! | **Processes**     | Readiness-gated launch, start retries, crash watchdog.         | [`ProcessSupervisor`], [`ReadinessLatch`]       |
//! | **Launcher**      | Commands started on request inside the session environment.   | [`ProcessLauncher`], [`SessionInterface`]       |
//! | **Environment**   | Session variables fanned out to every sink.                    | [`EnvironmentStore`], [`EnvironmentSink`]       |
//! | **Backend**       | Native supervision or delegation to an init system.            | [`BackendNegotiator`], [`InitSystem`]           |
//! | **IPC**           | External control surface and session backend passthroughs.     | [`SessionInterface`], [`SessionControl`]        |
//! | **Subscriber API**| Hook into lifecycle events.                                    | [`Subscribe`], [`LogWriter`]                    |
//! | **Configuration** | TOML-backed settings.                                          | [`SessionConfig`]                               |
//!
//! ## Example
//! ```rust
//! use sessionvisor::{
//!     EnvironmentMap, ModuleContext, ModuleError, ModuleFn, Orchestrator, Phase, PluginRegistry,
//!     SessionConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hello = ModuleFn::arc(Phase::Init, |ctx: ModuleContext| async move {
//!         ctx.link()
//!             .set_environment("HELLO", "world")
//!             .map_err(|e| ModuleError::start(e.to_string()))
//!     });
//!
//!     let registry = PluginRegistry::new("SessionModule").with_builtin("hello", hello);
//!     let orchestrator = Orchestrator::builder(SessionConfig::default())
//!         .with_registry(registry)
//!         .with_environment(EnvironmentMap::new())
//!         .build();
//!
//!     let handle = orchestrator.handle();
//!     let session = tokio::spawn(orchestrator.run());
//!
//!     // Applied once startup has completed.
//!     handle.set_environment("GREETING", "hi").await?;
//!     handle.logout("example finished")?;
//!
//!     session.await??;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
pub mod environment;
mod error;
mod events;
mod ipc;
mod modules;
mod policies;
mod process;
mod registry;
mod subscribers;

// ---- Public re-exports ----

pub use config::{
    AutostartConfig, AutostartEntry, Flavor, LocaleConfig, ProcessConfig, SessionConfig,
};
pub use core::{
    BackendMode, BackendNegotiator, InitSystem, Orchestrator, OrchestratorBuilder, State,
    spawn_signal_listener, wait_for_shutdown_signal,
};
pub use environment::{EnvironmentMap, EnvironmentSink, EnvironmentStore, InitSystemSink};
pub use error::{
    BoxError, DiscoveryError, ModuleError, ProcessError, PropagationError, SessionError,
    SupervisionFailure,
};
pub use events::{Bus, Event, EventKind};
pub use ipc::{
    BackendCall, BackendEvent, FakeBackend, InhibitToken, SessionBackend, SessionControl,
    SessionHandle, SessionInterface,
};
pub use modules::{
    AutostartModule, LocaleModule, Module, ModuleContext, ModuleFn, ModuleLink, ModuleRef, Phase,
    ProcessModule, locale_environment,
};
pub use policies::{BackoffPolicy, JitterPolicy, RestartBudget};
pub use process::{
    LaunchSpec, ProcessLauncher, ProcessSupervisor, Readiness, ReadinessLatch, Supervision,
    watch_path,
};
pub use registry::{MODULE_IID, Plugin, PluginCandidate, PluginRegistry, Rejection};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};

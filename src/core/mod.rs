//! Runtime core: orchestration and lifecycle.
//!
//! The public entry point is [`Orchestrator`], which owns module state and
//! drives startup, on-demand load/unload and teardown.
//!
//! Internal modules:
//! - [`orchestrator`]: the control loop and module state machine;
//! - [`backend`]: native vs. delegated decision and the init-system contract;
//! - [`state`]: the module lifecycle graph;
//! - [`builder`]: wiring of bus, subscribers, registry and environment;
//! - [`command`]: requests marshaled onto the control loop;
//! - [`shutdown`]: OS signal listener.

mod backend;
mod builder;
mod command;
mod orchestrator;
mod shutdown;
mod state;

pub use backend::{BackendMode, BackendNegotiator, InitSystem};
pub use builder::OrchestratorBuilder;
pub(crate) use command::Command;
pub use orchestrator::Orchestrator;
pub use shutdown::{spawn_signal_listener, wait_for_shutdown_signal};
pub use state::State;

//! # External process supervision.
//!
//! [`ProcessSupervisor`] brings up one program and keeps it alive within a
//! bounded budget. Readiness is observed through a [`ReadinessLatch`] that an
//! external observer (a path probe, an IPC name watcher) flips.
//!
//! ```text
//! launch() ──► spawn (retry × max_start_retries, backoff between attempts)
//!          ──► wait: latch met │ timeout (alive) │ exit (ExitedBeforeReady)
//!          ──► watchdog task:
//!                clean exit  → ProcessExited, done
//!                crash       → budget left? relaunch : CrashBudgetExhausted (notice once)
//!                latch lost  → ReadinessLost (notice once)
//!                stop token  → SIGTERM, stop_grace, SIGKILL
//! ```
//!
//! [`ProcessLauncher`] covers the unsupervised case: commands started on
//! request, reported when they exit, terminated when the session ends.

mod launcher;
mod readiness;
mod supervisor;

pub use launcher::ProcessLauncher;
pub use readiness::{Readiness, ReadinessLatch, watch_path};
pub use supervisor::{LaunchSpec, ProcessSupervisor, Supervision};
pub(crate) use supervisor::terminate;

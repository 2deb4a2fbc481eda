//! # Runtime events emitted by the orchestrator, supervisors and modules.
//!
//! The [`EventKind`] enum classifies event types across several categories:
//! - **Discovery events**: plugin candidates rejected by the registry
//! - **Module lifecycle events**: one per state transition (starting, running, failed, stopping, stopped, removed)
//! - **Process events**: spawn, readiness, exit/crash, restart budget
//! - **Environment events**: changes and propagation failures
//! - **Session events**: backend selection, shutdown, lock state
//!
//! The [`Event`] struct carries additional metadata such as timestamps, module name,
//! reasons, attempts and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use sessionvisor::{Event, EventKind, Phase};
//!
//! let ev = Event::new(EventKind::ModuleFailed)
//!     .with_module("shell")
//!     .with_phase(Phase::WindowManager)
//!     .with_reason("compositor missing");
//!
//! assert_eq!(ev.kind, EventKind::ModuleFailed);
//! assert_eq!(ev.module.as_deref(), Some("shell"));
//! assert_eq!(ev.reason.as_deref(), Some("compositor missing"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::modules::Phase;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `module` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `module` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Discovery ===
    /// A plugin candidate failed validation and was excluded.
    ///
    /// Sets: `module` (plugin id, when known), `reason`.
    ModuleRejected,

    // === Module lifecycle ===
    /// A module is about to be started.
    ///
    /// Sets: `module`, `phase`.
    ModuleStarting,

    /// A module started successfully.
    ///
    /// Sets: `module`, `phase`.
    ModuleRunning,

    /// A module failed to start.
    ///
    /// Sets: `module`, `phase`, `reason`.
    ModuleFailed,

    /// A module is about to be stopped.
    ///
    /// Sets: `module`.
    ModuleStopping,

    /// A module has been stopped (its stop may have reported an error, see `reason`).
    ///
    /// Sets: `module`, optional `reason`.
    ModuleStopped,

    /// The module instance went away; it has been dropped from every list.
    ///
    /// Sets: `module`.
    ModuleRemoved,

    // === Process supervision ===
    /// An external program was spawned.
    ///
    /// Sets: `module` (process label), `pid`, `attempt`.
    ProcessSpawned,

    /// Spawning failed; another attempt is scheduled.
    ///
    /// Sets: `module`, `attempt`, `delay_ms`, `reason`.
    SpawnRetryScheduled,

    /// The program signalled readiness.
    ///
    /// Sets: `module`, `pid`.
    ProcessReady,

    /// No readiness signal within the timeout; the program is alive and considered started.
    ///
    /// Sets: `module`, `pid`, `timeout_ms`.
    ReadinessTimedOut,

    /// A previously established readiness signal disappeared.
    ///
    /// Sets: `module`.
    ReadinessLost,

    /// The program exited cleanly.
    ///
    /// Sets: `module`, `pid`, `reason` (exit status).
    ProcessExited,

    /// The program crashed.
    ///
    /// Sets: `module`, `pid`, `reason` (exit status), `attempt` (crash count).
    ProcessCrashed,

    /// The crash-restart budget is exhausted; the owner is asked to shut down.
    ///
    /// Sets: `module`, `attempt` (crash count).
    CrashBudgetExhausted,

    // === Launched commands ===
    /// A command was started on behalf of an IPC caller.
    ///
    /// Sets: `module` (program), `pid`.
    CommandLaunched,

    /// A launched command exited or was terminated with the session.
    ///
    /// Sets: `module` (program), `pid`, `reason` (exit status).
    CommandExited,

    // === Environment ===
    /// A variable was set.
    ///
    /// Sets: `key`.
    EnvironmentSet,

    /// A variable was removed.
    ///
    /// Sets: `key`.
    EnvironmentUnset,

    /// A sink did not accept the environment.
    ///
    /// Sets: `sink`, `reason`.
    PropagationFailed,

    // === Session ===
    /// The backend mode was decided.
    ///
    /// Sets: `reason` ("native" / "delegated").
    BackendSelected,

    /// Shutdown has been requested (logout, OS signal, module request, backend).
    ///
    /// Sets: `reason`, optional `module` (requesting module).
    ShutdownRequested,

    /// All modules have been stopped; the session is over.
    SessionEnded,

    /// The session was locked.
    SessionLocked,

    /// The session was unlocked.
    SessionUnlocked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the module (or process label / subscriber), if applicable.
    pub module: Option<Arc<str>>,
    /// Phase of the module, for lifecycle events.
    pub phase: Option<Phase>,
    /// Human-readable reason (errors, exit status, etc.).
    pub reason: Option<Arc<str>>,
    /// Environment variable name.
    pub key: Option<Arc<str>>,
    /// Environment sink name.
    pub sink: Option<Arc<str>>,
    /// Attempt / crash count (starting from 1).
    pub attempt: Option<u32>,
    /// Process id.
    pub pid: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            module: None,
            phase: None,
            reason: None,
            key: None,
            sink: None,
            attempt: None,
            pid: None,
            timeout_ms: None,
            delay_ms: None,
        }
    }

    /// Attaches a module name.
    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches a phase.
    #[inline]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an environment variable name.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches an environment sink name.
    #[inline]
    pub fn with_sink(mut self, sink: impl Into<Arc<str>>) -> Self {
        self.sink = Some(sink.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_module(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_module(subscriber)
            .with_reason(info)
    }

    /// True for the five per-module transition events.
    #[inline]
    pub fn is_transition(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ModuleStarting
                | EventKind::ModuleRunning
                | EventKind::ModuleFailed
                | EventKind::ModuleStopping
                | EventKind::ModuleStopped
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

//! # Module state machine.
//!
//! ```text
//! Discovered ──► Registered ──┬──► Rejected
//!                             └──► Pending ──► Starting ──┬──► Running ──► Stopping ──► Stopped
//!                                     ▲                   └──► Failed                     │
//!                                     └───────────────────────────────────────────────────┘
//!                                                         (on-demand reload)
//!
//! any state ──► Removed   (plugin instance went away)
//! ```
//!
//! Only the orchestrator's control loop moves a module between states; every
//! move is checked with [`State::can_advance_to`].

use std::fmt;

/// Lifecycle state of one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Found by the registry, not yet handed to the orchestrator.
    Discovered,
    /// Known to the orchestrator.
    Registered,
    /// Excluded by configuration (disabled).
    Rejected,
    /// Scheduled for start.
    Pending,
    /// `start()` in progress.
    Starting,
    /// Started successfully.
    Running,
    /// `stop()` in progress.
    Stopping,
    /// Stopped (cleanly or not).
    Stopped,
    /// `start()` failed. Terminal.
    Failed,
    /// The plugin instance is gone. Terminal.
    Removed,
}

impl State {
    /// True if `next` is an edge of the lifecycle graph from `self`.
    pub fn can_advance_to(self, next: State) -> bool {
        use State::*;
        match (self, next) {
            (Removed, _) => false,
            (_, Removed) => true,
            (Discovered, Registered) => true,
            (Registered, Rejected | Pending) => true,
            (Pending, Starting) => true,
            (Starting, Running | Failed) => true,
            (Running, Stopping) => true,
            (Stopping, Stopped) => true,
            (Stopped, Pending) => true,
            _ => false,
        }
    }

    /// True for states with no outgoing edge except `Removed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Failed | State::Removed)
    }

    /// Stable label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Discovered => "discovered",
            State::Registered => "registered",
            State::Rejected => "rejected",
            State::Pending => "pending",
            State::Starting => "starting",
            State::Running => "running",
            State::Stopping => "stopping",
            State::Stopped => "stopped",
            State::Failed => "failed",
            State::Removed => "removed",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

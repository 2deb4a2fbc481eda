//! Error types used by the sessionvisor runtime, its modules and collaborators.
//!
//! One enum per layer:
//!
//! - [`SessionError`]: errors raised by the orchestrator itself (fatal for the session).
//! - [`ModuleError`]: a single module failed to start or stop.
//! - [`ProcessError`]: the process supervisor could not bring up or signal a program.
//! - [`SupervisionFailure`]: a running process can no longer be kept alive (escalates to shutdown).
//! - [`PropagationError`]: an environment sink did not accept an update (never fatal).
//! - [`DiscoveryError`]: a plugin candidate was rejected during discovery (never fatal).
//!
//! Every type provides `as_label()` (a short stable snake_case label for logs/events);
//! the session and module errors also provide `as_message()`.

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by external collaborators (sinks, init system, session backend).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// # Errors produced by the session orchestrator.
///
/// These end the session (or prevent it from starting). The binary maps
/// any of them to a non-zero exit code.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SessionError {
    /// The chosen backend mode requires an external service that is not there.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable {
        /// Why the backend was rejected.
        reason: String,
    },

    /// A module failed to start; every running module has been stopped.
    #[error("session module \"{module}\" failed to start: {source}")]
    StartupFailed {
        /// Name of the module that failed.
        module: String,
        /// The module's own error.
        #[source]
        source: ModuleError,
    },

    /// A shutdown was requested while modules were still being started.
    #[error("startup aborted by shutdown request: {reason}")]
    StartupAborted {
        /// Reason attached to the shutdown request.
        reason: String,
    },

    /// The delegated target unit could not be loaded or started.
    #[error("init system refused to start unit \"{unit}\"")]
    UnitFailed {
        /// Unit name.
        unit: String,
    },

    /// `start()` was called twice.
    #[error("session already started")]
    AlreadyStarted,

    /// `start()` was called before `initialize()`.
    #[error("session not initialized")]
    NotInitialized,

    /// The control loop is gone (the session has already ended).
    #[error("session control channel closed")]
    Closed,

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A command requested over IPC could not be launched.
    #[error("cannot launch command: {0}")]
    Launch(#[source] ProcessError),

    /// The session backend refused a passthrough call.
    #[error("session backend failed to {op}: {error}")]
    Backend {
        /// Operation name (`lock`, `inhibit`, ...).
        op: &'static str,
        /// Backend error.
        error: BoxError,
    },
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use sessionvisor::SessionError;
    ///
    /// let err = SessionError::BackendUnavailable { reason: "no init system".into() };
    /// assert_eq!(err.as_label(), "session_backend_unavailable");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::BackendUnavailable { .. } => "session_backend_unavailable",
            SessionError::StartupFailed { .. } => "session_startup_failed",
            SessionError::StartupAborted { .. } => "session_startup_aborted",
            SessionError::UnitFailed { .. } => "session_unit_failed",
            SessionError::AlreadyStarted => "session_already_started",
            SessionError::NotInitialized => "session_not_initialized",
            SessionError::Closed => "session_closed",
            SessionError::Config(_) => "session_config",
            SessionError::Launch(_) => "session_launch_failed",
            SessionError::Backend { .. } => "session_backend",
        }
    }

    /// Returns a human-readable message, including the failing module's cause.
    pub fn as_message(&self) -> String {
        match self {
            SessionError::StartupFailed { module, source } => {
                format!("module {module} failed: {}", source.as_message())
            }
            other => other.to_string(),
        }
    }
}

/// # Errors produced by a single module.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModuleError {
    /// The module could not bring up its functionality.
    #[error("start failed: {error}")]
    Start {
        /// The underlying error message.
        error: String,
    },

    /// The module did not tear down cleanly.
    #[error("stop failed: {error}")]
    Stop {
        /// The underlying error message.
        error: String,
    },

    /// The module's external process could not be supervised.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ModuleError {
    /// Shorthand for [`ModuleError::Start`].
    pub fn start(error: impl Into<String>) -> Self {
        ModuleError::Start {
            error: error.into(),
        }
    }

    /// Shorthand for [`ModuleError::Stop`].
    pub fn stop(error: impl Into<String>) -> Self {
        ModuleError::Stop {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ModuleError::Start { .. } => "module_start_failed",
            ModuleError::Stop { .. } => "module_stop_failed",
            ModuleError::Process(e) => e.as_label(),
        }
    }

    /// Returns the underlying cause without the start/stop prefix.
    pub fn as_message(&self) -> String {
        match self {
            ModuleError::Start { error } | ModuleError::Stop { error } => error.clone(),
            ModuleError::Process(e) => e.to_string(),
        }
    }
}

/// # Errors produced by the process supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Spawning failed on every attempt.
    #[error("failed to start \"{program}\" after {attempts} attempt(s): {error}")]
    FailedToStart {
        /// Program path.
        program: String,
        /// How many spawn attempts were made.
        attempts: u32,
        /// Last spawn error.
        error: String,
    },

    /// The process terminated while we were waiting for it to become ready.
    #[error("\"{program}\" exited before becoming ready ({status})")]
    ExitedBeforeReady {
        /// Program path.
        program: String,
        /// Exit status description.
        status: String,
    },

    /// A launch request carried no program.
    #[error("empty command")]
    EmptyCommand,

    /// A termination signal could not be delivered.
    #[error("failed to signal pid {pid}: {error}")]
    Signal {
        /// Target pid.
        pid: u32,
        /// Underlying error.
        error: String,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::FailedToStart { .. } => "process_failed_to_start",
            ProcessError::ExitedBeforeReady { .. } => "process_exited_before_ready",
            ProcessError::EmptyCommand => "process_empty_command",
            ProcessError::Signal { .. } => "process_signal_failed",
        }
    }
}

/// # Fatal notices from a process watchdog.
///
/// Sent at most once per supervised process. The owning module turns it into a
/// shutdown request.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisionFailure {
    /// The program kept crashing after every allowed restart.
    #[error("\"{program}\" crashed {crashes} time(s), restart budget exhausted")]
    CrashBudgetExhausted {
        /// Program path.
        program: String,
        /// Number of crashes observed.
        crashes: u32,
    },

    /// An established readiness signal disappeared.
    #[error("\"{program}\" lost its readiness signal")]
    ReadinessLost {
        /// Program path.
        program: String,
    },
}

impl SupervisionFailure {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisionFailure::CrashBudgetExhausted { .. } => "supervision_crash_budget_exhausted",
            SupervisionFailure::ReadinessLost { .. } => "supervision_readiness_lost",
        }
    }
}

/// # Errors produced while pushing the environment to a sink.
///
/// Always contained: logged and reported, other sinks are still updated.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PropagationError {
    /// The sink answered with an error.
    #[error("sink \"{sink}\" rejected environment: {error}")]
    Rejected {
        /// Sink name.
        sink: String,
        /// Sink error message.
        error: String,
    },

    /// The sink did not answer within the configured timeout.
    #[error("sink \"{sink}\" timed out after {timeout:?}")]
    Timeout {
        /// Sink name.
        sink: String,
        /// The timeout that was exceeded.
        timeout: Duration,
    },
}

impl PropagationError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            PropagationError::Rejected { .. } => "propagation_rejected",
            PropagationError::Timeout { .. } => "propagation_timeout",
        }
    }

    /// Name of the sink that failed.
    pub fn sink(&self) -> &str {
        match self {
            PropagationError::Rejected { sink, .. } | PropagationError::Timeout { sink, .. } => {
                sink
            }
        }
    }
}

/// # Reasons a plugin candidate is rejected during discovery.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// No interface identifier or no metadata block.
    #[error("invalid plugin: missing interface id or metadata")]
    MissingMetadata,

    /// Interface identifier does not match the expected one.
    #[error("plugin implements \"{found}\" instead of \"{expected}\"")]
    WrongInterface {
        /// Expected interface id.
        expected: String,
        /// Interface id found in the candidate.
        found: String,
    },

    /// Metadata lacks the mandatory `id` key.
    #[error("plugin metadata has no id")]
    MissingId,

    /// Metadata declares another module kind.
    #[error("plugin \"{id}\" is of type {found} instead of {expected}")]
    WrongType {
        /// Plugin id.
        id: String,
        /// Expected module kind.
        expected: String,
        /// Declared module kind.
        found: String,
    },

    /// Another plugin with the same id was accepted first.
    #[error("plugin \"{id}\" is already registered")]
    Duplicate {
        /// Plugin id.
        id: String,
    },

    /// An on-disk manifest could not be read or parsed.
    #[error("manifest {path}: {error}")]
    Manifest {
        /// Manifest path.
        path: String,
        /// Read/parse error.
        error: String,
    },
}

impl DiscoveryError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            DiscoveryError::MissingMetadata => "discovery_missing_metadata",
            DiscoveryError::WrongInterface { .. } => "discovery_wrong_interface",
            DiscoveryError::MissingId => "discovery_missing_id",
            DiscoveryError::WrongType { .. } => "discovery_wrong_type",
            DiscoveryError::Duplicate { .. } => "discovery_duplicate",
            DiscoveryError::Manifest { .. } => "discovery_manifest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_failure_mentions_module_and_cause() {
        let err = SessionError::StartupFailed {
            module: "shell".into(),
            source: ModuleError::start("no compositor"),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"shell\""));
        assert!(msg.contains("no compositor"));
        assert_eq!(err.as_label(), "session_startup_failed");
        assert_eq!(err.as_message(), "module shell failed: no compositor");
    }

    #[test]
    fn process_errors_keep_their_label_through_module_error() {
        let err: ModuleError = ProcessError::FailedToStart {
            program: "/usr/libexec/shell".into(),
            attempts: 6,
            error: "ENOENT".into(),
        }
        .into();
        assert_eq!(err.as_label(), "process_failed_to_start");
    }

    #[test]
    fn propagation_error_exposes_sink_name() {
        let err = PropagationError::Timeout {
            sink: "activation".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(err.sink(), "activation");
        assert_eq!(err.as_label(), "propagation_timeout");
    }
}

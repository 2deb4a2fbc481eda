//! # Session configuration.
//!
//! Provides [`SessionConfig`], the centralized settings for one orchestrator run.
//! It is normally read from a TOML file; every field has a default so an empty
//! file (or no file) is a valid configuration.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 (see [`SessionConfig::bus_capacity_clamped`])
//! - `readiness_timeout_ms = 0` → do not wait for readiness at all
//! - `max_crash_restarts = 0` → the first crash is fatal
//!
//! ## Example file
//! ```toml
//! mode = "native"
//! disabled_modules = ["autostart"]
//! readiness_timeout_ms = 30000
//!
//! [module_args]
//! shell = ["--lock"]
//!
//! [shell]
//! program = "/usr/bin/session-shell"
//! phase = "window-manager"
//! readiness = "/run/user/1000/wayland-0"
//! remove_env = ["QT_QPA_PLATFORM"]
//!
//! [locale]
//! language = "it_IT.UTF-8"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::core::BackendMode;
use crate::error::SessionError;
use crate::modules::Phase;
use crate::policies::BackoffPolicy;
use crate::process::Supervision;

/// Deserializes a `Duration` stored as integer milliseconds.
pub(crate) fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Which kind of orchestrator this run is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flavor {
    /// Full desktop session.
    #[default]
    Session,
    /// Small set of background daemons, some loaded on demand.
    Daemon,
}

impl Flavor {
    /// Module kind a plugin must declare in its metadata `type`.
    pub fn module_kind(&self) -> &'static str {
        match self {
            Flavor::Session => "SessionModule",
            Flavor::Daemon => "DaemonModule",
        }
    }
}

/// Global configuration for one orchestrator run.
///
/// ## Field semantics
/// - `grace`: upper bound for a single module's `stop()` during teardown
/// - `readiness_timeout`, `max_start_retries`, `max_crash_restarts`, `stop_grace`, `backoff`:
///   defaults for every supervised process
/// - `sink_timeout`: bound for one environment sink round-trip and for each init-system call
/// - `disabled_modules`, `module_args`: pre-parsed command-line equivalents
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session or daemon orchestrator.
    pub flavor: Flavor,

    /// Requested backend mode. Decided once, before initialization.
    pub mode: BackendMode,

    /// Init-system unit started in delegated mode.
    pub target_unit: String,

    /// Desktop name advertised in `XDG_CURRENT_DESKTOP` and friends.
    pub desktop: String,

    /// Maximum time one module's `stop()` may take during teardown.
    ///
    /// A module exceeding it is reported and teardown moves on.
    #[serde(rename = "grace_ms", deserialize_with = "millis")]
    pub grace: Duration,

    /// Capacity of the event bus ring buffer.
    pub bus_capacity: usize,

    /// How long a supervised process may take to signal readiness.
    #[serde(rename = "readiness_timeout_ms", deserialize_with = "millis")]
    pub readiness_timeout: Duration,

    /// Spawn retries after the first failed attempt.
    pub max_start_retries: u32,

    /// Automatic relaunches after crashes before the session is torn down.
    pub max_crash_restarts: u32,

    /// Time between the polite and the forced termination of a process.
    #[serde(rename = "stop_grace_ms", deserialize_with = "millis")]
    pub stop_grace: Duration,

    /// Bound for one environment sink call.
    #[serde(rename = "sink_timeout_ms", deserialize_with = "millis")]
    pub sink_timeout: Duration,

    /// Delay between spawn attempts.
    pub backoff: BackoffPolicy,

    /// Modules that are never started.
    pub disabled_modules: Vec<String>,

    /// Extra start arguments per module name.
    pub module_args: BTreeMap<String, Vec<String>>,

    /// Directories scanned for `*.toml` plugin manifests.
    pub plugin_dirs: Vec<PathBuf>,

    /// The shell / compositor process, if any.
    pub shell: Option<ProcessConfig>,

    /// Locale module settings.
    pub locale: LocaleConfig,

    /// Autostart module settings.
    pub autostart: AutostartConfig,
}

impl Default for SessionConfig {
    /// Default configuration:
    ///
    /// - native mode, session flavor
    /// - `grace = 10s`, `bus_capacity = 1024`
    /// - `readiness_timeout = 30s`, `max_start_retries = 4`, `max_crash_restarts = 5`
    /// - `stop_grace = 5s`, `sink_timeout = 2s`
    fn default() -> Self {
        Self {
            flavor: Flavor::default(),
            mode: BackendMode::default(),
            target_unit: "sessionvisor-session.target".to_string(),
            desktop: "sessionvisor".to_string(),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            readiness_timeout: Duration::from_secs(30),
            max_start_retries: 4,
            max_crash_restarts: 5,
            stop_grace: Duration::from_secs(5),
            sink_timeout: Duration::from_secs(2),
            backoff: BackoffPolicy::default(),
            disabled_modules: Vec::new(),
            module_args: BTreeMap::new(),
            plugin_dirs: Vec::new(),
            shell: None,
            locale: LocaleConfig::default(),
            autostart: AutostartConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Supervision defaults handed to every process module.
    pub fn supervision(&self) -> Supervision {
        Supervision {
            readiness_timeout: self.readiness_timeout,
            max_start_retries: self.max_start_retries,
            max_crash_restarts: self.max_crash_restarts,
            stop_grace: self.stop_grace,
            backoff: self.backoff,
        }
    }

    /// Configured start arguments of `module` (empty if none).
    pub fn args_for(&self, module: &str) -> Vec<String> {
        self.module_args.get(module).cloned().unwrap_or_default()
    }
}

/// An external program run as a module.
#[derive(Clone, Debug, Deserialize)]
pub struct ProcessConfig {
    /// Program path.
    pub program: String,
    /// Arguments placed before the per-module start arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Startup phase.
    #[serde(default = "default_process_phase")]
    pub phase: Phase,
    /// Path whose appearance signals readiness (a socket, a pid file).
    #[serde(default)]
    pub readiness: Option<PathBuf>,
    /// Variables removed from the program's environment.
    #[serde(default)]
    pub remove_env: Vec<String>,
}

fn default_process_phase() -> Phase {
    Phase::Init
}

/// Locale settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// UI language (`LANG`, `LANGUAGE`, `LC_MESSAGES`). Falls back to the inherited `LANG`.
    pub language: Option<String>,
    /// Regional formats (`LC_TIME`, `LC_NUMERIC`, ...). Falls back to the language.
    pub region: Option<String>,
}

/// Autostart settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AutostartConfig {
    /// Pre-resolved autostart entries, started in order.
    pub entries: Vec<AutostartEntry>,
}

/// One autostart application, already parsed from its desktop entry.
#[derive(Clone, Debug, Deserialize)]
pub struct AutostartEntry {
    /// Entry name (for logs).
    pub name: String,
    /// Program followed by its arguments.
    pub exec: Vec<String>,
    /// Entry is hidden or not meant for this desktop.
    #[serde(default)]
    pub hidden: bool,
    /// Entry is provided by an init-system unit when running delegated.
    #[serde(default)]
    pub hidden_under_init: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = SessionConfig::from_toml_str("").expect("parse");
        assert_eq!(cfg.mode, BackendMode::Native);
        assert_eq!(cfg.flavor, Flavor::Session);
        assert_eq!(cfg.readiness_timeout, Duration::from_secs(30));
        assert!(cfg.shell.is_none());
    }

    #[test]
    fn durations_are_read_as_milliseconds() {
        let cfg = SessionConfig::from_toml_str(
            r#"
            mode = "delegated"
            readiness_timeout_ms = 250
            sink_timeout_ms = 10
            disabled_modules = ["autostart"]

            [backoff]
            first_ms = 5
            max_ms = 40
            factor = 3.0

            [module_args]
            shell = ["--lock"]

            [shell]
            program = "/usr/bin/shell"
            phase = "window-manager"
            remove_env = ["QT_QPA_PLATFORM"]
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.mode, BackendMode::Delegated);
        assert_eq!(cfg.readiness_timeout, Duration::from_millis(250));
        assert_eq!(cfg.sink_timeout, Duration::from_millis(10));
        assert_eq!(cfg.backoff.first, Duration::from_millis(5));
        assert_eq!(cfg.backoff.max, Duration::from_millis(40));
        assert_eq!(cfg.args_for("shell"), vec!["--lock".to_string()]);
        assert!(cfg.args_for("locale").is_empty());

        let shell = cfg.shell.expect("shell");
        assert_eq!(shell.phase, Phase::WindowManager);
        assert_eq!(shell.remove_env, vec!["QT_QPA_PLATFORM".to_string()]);
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = SessionConfig::from_toml_str("mode = 3").expect_err("must fail");
        assert_eq!(err.as_label(), "session_config");
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = SessionConfig {
            bus_capacity: 0,
            ..SessionConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SessionConfig::load("/nonexistent/sessionvisor.toml").expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/sessionvisor.toml"));
    }
}

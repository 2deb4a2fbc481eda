//! # ProcessSupervisor
//!
//! Owns one external program from spawn to confirmed exit.
//!
//! ## Rules
//! - `launch()` makes at most `1 + max_start_retries` spawn attempts.
//! - `launch()` returns once the latch is met, or the readiness timeout
//!   elapses with the program still alive.
//! - Exit status 0 is a clean exit: logged, never restarted.
//! - Any other termination is a crash. While not stopping, each crash consumes
//!   one restart unit; a relaunch that fails to spawn is a further crash.
//! - Budget exhaustion and readiness loss share a single fatal notice.
//! - `stop()` is idempotent and safe after the program has exited.

use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::readiness::{Readiness, ReadinessLatch};
use crate::environment::{EnvironmentMap, defaults};
use crate::error::{ProcessError, SupervisionFailure};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, RestartBudget};

/// Supervision limits for one program.
#[derive(Clone, Copy, Debug)]
pub struct Supervision {
    /// How long `launch()` waits for the readiness latch (`0` = do not wait).
    pub readiness_timeout: Duration,
    /// Spawn retries after the first failed attempt.
    pub max_start_retries: u32,
    /// Automatic relaunches after crashes.
    pub max_crash_restarts: u32,
    /// Delay between SIGTERM and SIGKILL.
    pub stop_grace: Duration,
    /// Delay between spawn attempts and before each relaunch.
    pub backoff: BackoffPolicy,
}

impl Default for Supervision {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(30),
            max_start_retries: 4,
            max_crash_restarts: 5,
            stop_grace: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// What to run and how to watch it.
#[derive(Clone, Debug)]
pub struct LaunchSpec {
    /// Name used in events (usually the module name).
    pub label: String,
    /// Program path.
    pub program: String,
    /// Program arguments.
    pub args: Vec<String>,
    /// Environment source; every (re)launch reads its current value.
    pub env: watch::Receiver<EnvironmentMap>,
    /// Limits.
    pub supervision: Supervision,
    /// Readiness latch, if the program has an observable readiness signal.
    pub readiness: Option<ReadinessLatch>,
}

impl LaunchSpec {
    /// Spec for `program` with the inherited environment and default limits.
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        let (_tx, env) = watch::channel(defaults::inherited());
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            env,
            supervision: Supervision::default(),
            readiness: None,
        }
    }

    /// Sets the arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Uses a fixed environment.
    pub fn with_env(mut self, env: EnvironmentMap) -> Self {
        let (_tx, rx) = watch::channel(env);
        self.env = rx;
        self
    }

    /// Uses a live environment source (relaunches pick up later changes).
    pub fn with_env_source(mut self, env: watch::Receiver<EnvironmentMap>) -> Self {
        self.env = env;
        self
    }

    /// Sets the supervision limits.
    pub fn with_supervision(mut self, supervision: Supervision) -> Self {
        self.supervision = supervision;
        self
    }

    /// Waits on `latch` for readiness.
    pub fn with_readiness(mut self, latch: ReadinessLatch) -> Self {
        self.readiness = Some(latch);
        self
    }
}

struct Inner {
    spec: LaunchSpec,
    bus: Bus,
    failures: mpsc::UnboundedSender<SupervisionFailure>,
    stop: CancellationToken,
    pid: AtomicU32,
    escalated: AtomicBool,
}

impl Inner {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_module(self.spec.label.as_str())
    }

    fn spawn_once(&self) -> std::io::Result<Child> {
        let env = self.spec.env.borrow().clone();
        let child = Command::new(&self.spec.program)
            .args(&self.spec.args)
            .env_clear()
            .envs(&env)
            .kill_on_drop(true)
            .spawn()?;
        self.pid.store(child.id().unwrap_or(0), Ordering::Release);
        Ok(child)
    }

    async fn spawn_with_retries(&self) -> Result<Child, ProcessError> {
        let sup = &self.spec.supervision;
        let attempts = sup.max_start_retries.saturating_add(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match self.spawn_once() {
                Ok(child) => {
                    let mut ev = self.event(EventKind::ProcessSpawned).with_attempt(attempt);
                    if let Some(pid) = child.id() {
                        ev = ev.with_pid(pid);
                    }
                    self.bus.publish(ev);
                    return Ok(child);
                }
                Err(e) => e.to_string(),
            };
            if attempt >= attempts {
                return Err(ProcessError::FailedToStart {
                    program: self.spec.program.clone(),
                    attempts: attempt,
                    error,
                });
            }

            let delay = sup.backoff.delay(attempt - 1);
            self.bus.publish(
                self.event(EventKind::SpawnRetryScheduled)
                    .with_attempt(attempt)
                    .with_delay(delay)
                    .with_reason(error.as_str()),
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.stop.cancelled() => {
                    return Err(ProcessError::FailedToStart {
                        program: self.spec.program.clone(),
                        attempts: attempt,
                        error,
                    });
                }
            }
        }
    }

    fn escalate(&self, failure: SupervisionFailure) {
        if self.escalated.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.failures.send(failure);
    }
}

/// Supervisor of one external program.
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
    watchdog: Mutex<Option<JoinHandle<Result<(), ProcessError>>>>,
}

impl ProcessSupervisor {
    /// Creates a supervisor. Fatal notices are sent on `failures`, at most once.
    pub fn new(
        spec: LaunchSpec,
        bus: Bus,
        failures: mpsc::UnboundedSender<SupervisionFailure>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                spec,
                bus,
                failures,
                stop: CancellationToken::new(),
                pid: AtomicU32::new(0),
                escalated: AtomicBool::new(false),
            }),
            watchdog: Mutex::new(None),
        }
    }

    /// Spawns the program and waits for it to become ready.
    ///
    /// Returns the pid on success. Calling it again while a watchdog is active
    /// returns the current pid without spawning.
    pub async fn launch(&self) -> Result<u32, ProcessError> {
        let mut slot = self.watchdog.lock().await;
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(self.inner.pid.load(Ordering::Acquire));
        }

        let inner = &self.inner;
        let mut child = inner.spawn_with_retries().await?;
        let pid = child.id().unwrap_or(0);

        let timeout = inner.spec.supervision.readiness_timeout;
        if let Some(latch) = inner.spec.readiness.as_ref().filter(|_| !timeout.is_zero()) {
            latch.reset();
            tokio::select! {
                _ = latch.wait_ready() => {
                    inner.bus.publish(inner.event(EventKind::ProcessReady).with_pid(pid));
                }
                status = child.wait() => {
                    inner.pid.store(0, Ordering::Release);
                    return Err(ProcessError::ExitedBeforeReady {
                        program: inner.spec.program.clone(),
                        status: describe(status),
                    });
                }
                _ = tokio::time::sleep(timeout) => {
                    if let Ok(Some(status)) = child.try_wait() {
                        inner.pid.store(0, Ordering::Release);
                        return Err(ProcessError::ExitedBeforeReady {
                            program: inner.spec.program.clone(),
                            status: status.to_string(),
                        });
                    }
                    latch.mark_timed_out();
                    inner.bus.publish(
                        inner
                            .event(EventKind::ReadinessTimedOut)
                            .with_pid(pid)
                            .with_timeout(timeout),
                    );
                }
            }
        }

        *slot = Some(tokio::spawn(watchdog(Arc::clone(inner), child)));
        Ok(pid)
    }

    /// Stops the program: SIGTERM, `stop_grace`, then SIGKILL. Suppresses restarts.
    pub async fn stop(&self) -> Result<(), ProcessError> {
        self.inner.stop.cancel();
        let handle = self.watchdog.lock().await.take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(ProcessError::Signal {
                pid: self.inner.pid.load(Ordering::Acquire),
                error: e.to_string(),
            }),
        }
    }

    /// Pid of the current instance, if one is running.
    pub fn pid(&self) -> Option<u32> {
        match self.inner.pid.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// True once `stop()` has been called.
    pub fn is_stopping(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    /// Name used in events.
    pub fn label(&self) -> &str {
        &self.inner.spec.label
    }
}

async fn watchdog(inner: Arc<Inner>, mut child: Child) -> Result<(), ProcessError> {
    let sup = inner.spec.supervision;
    let mut budget = RestartBudget::new(sup.max_crash_restarts);
    let mut readiness = inner.spec.readiness.as_ref().map(ReadinessLatch::subscribe);
    let mut crashes = 0u32;

    loop {
        let pid = child.id().unwrap_or(0);
        let status = tokio::select! {
            _ = inner.stop.cancelled() => {
                let res = terminate(&mut child, sup.stop_grace).await;
                inner.pid.store(0, Ordering::Release);
                return res;
            }
            _ = readiness_lost(&mut readiness) => {
                readiness = None;
                inner.bus.publish(inner.event(EventKind::ReadinessLost).with_pid(pid));
                inner.escalate(SupervisionFailure::ReadinessLost {
                    program: inner.spec.program.clone(),
                });
                continue;
            }
            status = child.wait() => status,
        };
        inner.pid.store(0, Ordering::Release);

        if let Ok(status) = &status {
            if status.success() {
                inner.bus.publish(
                    inner
                        .event(EventKind::ProcessExited)
                        .with_pid(pid)
                        .with_reason(status.to_string()),
                );
                return Ok(());
            }
        }

        let mut reason = describe(status);
        loop {
            crashes += 1;
            inner.bus.publish(
                inner
                    .event(EventKind::ProcessCrashed)
                    .with_pid(pid)
                    .with_attempt(crashes)
                    .with_reason(reason.as_str()),
            );
            if inner.stop.is_cancelled() {
                return Ok(());
            }
            let Some(restart) = budget.try_consume() else {
                inner.bus.publish(
                    inner
                        .event(EventKind::CrashBudgetExhausted)
                        .with_attempt(crashes),
                );
                inner.escalate(SupervisionFailure::CrashBudgetExhausted {
                    program: inner.spec.program.clone(),
                    crashes,
                });
                return Ok(());
            };

            tokio::select! {
                _ = tokio::time::sleep(sup.backoff.delay(restart - 1)) => {}
                _ = inner.stop.cancelled() => return Ok(()),
            }
            if let Some(latch) = &inner.spec.readiness {
                latch.reset();
            }
            match inner.spawn_once() {
                Ok(next) => {
                    let mut ev = inner
                        .event(EventKind::ProcessSpawned)
                        .with_attempt(restart + 1);
                    if let Some(pid) = next.id() {
                        ev = ev.with_pid(pid);
                    }
                    inner.bus.publish(ev);
                    child = next;
                    break;
                }
                Err(e) => reason = format!("relaunch failed: {e}"),
            }
        }
    }
}

async fn readiness_lost(rx: &mut Option<watch::Receiver<Readiness>>) {
    match rx {
        Some(rx) => {
            if rx.wait_for(|s| *s == Readiness::Lost).await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
        None => futures::future::pending::<()>().await,
    }
}

fn describe(status: std::io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => status.to_string(),
        Err(e) => format!("wait failed: {e}"),
    }
}

/// Politely terminates `child`, escalating to SIGKILL after `grace`.
///
/// Returns immediately if the child has already exited.
pub(crate) async fn terminate(child: &mut Child, grace: Duration) -> Result<(), ProcessError> {
    if let Ok(Some(_)) = child.try_wait() {
        return Ok(());
    }
    let Some(pid) = child.id() else {
        return Ok(());
    };

    request_termination(pid)?;
    if tokio::time::timeout(grace, child.wait()).await.is_ok() {
        return Ok(());
    }
    child.kill().await.map_err(|e| ProcessError::Signal {
        pid,
        error: e.to_string(),
    })
}

#[cfg(unix)]
fn request_termination(pid: u32) -> Result<(), ProcessError> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|e| ProcessError::Signal {
        pid,
        error: e.to_string(),
    })?;
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(ProcessError::Signal {
            pid,
            error: e.to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn request_termination(_pid: u32) -> Result<(), ProcessError> {
    Ok(())
}

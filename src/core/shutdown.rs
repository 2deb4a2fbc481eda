//! # OS signal handling.
//!
//! Provides [`wait_for_shutdown_signal`] and [`spawn_signal_listener`].
//! A signal never runs teardown itself: the listener only enqueues a logout on
//! the control loop.
//!
//! ## Signals
//! **Unix platforms:** `SIGINT`, `SIGTERM`, `SIGQUIT`, `SIGHUP`.
//!
//! **Other platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::ipc::SessionHandle;

/// Waits for a termination signal.
///
/// Returns the signal name, or `Err` if registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
        _ = sighup.recv()  => "SIGHUP",
    };
    Ok(name)
}

/// Waits for a termination signal.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Spawns a task that turns the first termination signal into a logout.
pub fn spawn_signal_listener(handle: SessionHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => {
                info!(signal, "termination signal received");
                let _ = handle.logout(format!("received {signal}"));
            }
            Err(e) => warn!(error = %e, "cannot listen for termination signals"),
        }
    })
}

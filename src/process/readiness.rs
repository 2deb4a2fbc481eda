//! # Readiness latch.
//!
//! A single-fire flag shared between the supervisor (which waits on it) and the
//! observer that sees the program become ready.
//!
//! ```text
//! Unset ──mark_ready──► Met ──mark_lost──► Lost
//!   │                    ▲
//!   └──(timeout)──► TimedOut
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Observed readiness of a supervised program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Nothing observed yet.
    Unset,
    /// The program signalled readiness.
    Met,
    /// The wait timed out; the program is assumed started.
    TimedOut,
    /// A signal that had been met went away.
    Lost,
}

/// Shared, cloneable readiness flag.
#[derive(Clone, Debug)]
pub struct ReadinessLatch {
    tx: Arc<watch::Sender<Readiness>>,
}

impl Default for ReadinessLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessLatch {
    /// Creates an unset latch.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Readiness::Unset);
        Self { tx: Arc::new(tx) }
    }

    /// Current state.
    pub fn state(&self) -> Readiness {
        *self.tx.borrow()
    }

    /// Records readiness. Returns false if it was already met or lost.
    pub fn mark_ready(&self) -> bool {
        self.tx.send_if_modified(|s| match s {
            Readiness::Unset | Readiness::TimedOut => {
                *s = Readiness::Met;
                true
            }
            Readiness::Met | Readiness::Lost => false,
        })
    }

    /// Records that a met signal disappeared. Ignored unless currently met.
    pub fn mark_lost(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == Readiness::Met {
                *s = Readiness::Lost;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn mark_timed_out(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == Readiness::Unset {
                *s = Readiness::TimedOut;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(Readiness::Unset);
    }

    /// Resolves once the latch is met.
    pub async fn wait_ready(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|s| *s == Readiness::Met).await;
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.tx.subscribe()
    }
}

const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Flips `latch` when `path` appears, and marks it lost if the path later disappears.
///
/// Typical paths are a compositor socket or a pid file. The probe follows the
/// latch: after a `reset()` (a relaunch) it waits for the path again, so every
/// instance of the program is watched. Runs until aborted.
pub fn watch_path(path: PathBuf, latch: ReadinessLatch) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PROBE_INTERVAL);
        // Set when this probe met the latch for the current instance.
        let mut armed = false;
        loop {
            ticker.tick().await;
            let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
            match latch.state() {
                Readiness::Unset | Readiness::TimedOut => {
                    armed = exists && latch.mark_ready();
                }
                Readiness::Met if armed && !exists => {
                    armed = false;
                    latch.mark_lost();
                }
                Readiness::Met | Readiness::Lost => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_latch_graph() {
        let latch = ReadinessLatch::new();
        assert!(!latch.mark_lost());
        assert!(latch.mark_timed_out());
        assert!(latch.mark_ready());
        assert!(!latch.mark_ready());
        assert!(!latch.mark_timed_out());
        assert!(latch.mark_lost());
        assert_eq!(latch.state(), Readiness::Lost);

        latch.reset();
        assert_eq!(latch.state(), Readiness::Unset);
    }

    #[tokio::test]
    async fn wait_ready_resolves_when_marked_from_another_task() {
        let latch = ReadinessLatch::new();
        let observer = latch.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            observer.mark_ready();
        });
        tokio::time::timeout(Duration::from_secs(2), latch.wait_ready())
            .await
            .expect("latch met");
    }

    #[tokio::test]
    async fn path_probe_reports_appearance_and_loss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket = dir.path().join("wayland-0");
        let latch = ReadinessLatch::new();
        let probe = watch_path(socket.clone(), latch.clone());

        std::fs::write(&socket, b"").expect("create");
        tokio::time::timeout(Duration::from_secs(2), latch.wait_ready())
            .await
            .expect("ready");

        std::fs::remove_file(&socket).expect("remove");
        let mut rx = latch.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == Readiness::Lost))
            .await
            .expect("loss in time")
            .expect("latch alive");
        probe.abort();
    }

    #[tokio::test]
    async fn path_watch_rearms_after_reset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket = dir.path().join("wayland-0");
        let latch = ReadinessLatch::new();
        let probe = watch_path(socket.clone(), latch.clone());

        std::fs::write(&socket, b"").expect("create");
        tokio::time::timeout(Duration::from_secs(2), latch.wait_ready())
            .await
            .expect("first instance ready");

        // Relaunch: the stale socket still exists, so readiness is re-established.
        latch.reset();
        tokio::time::timeout(Duration::from_secs(2), latch.wait_ready())
            .await
            .expect("second instance ready");

        std::fs::remove_file(&socket).expect("remove");
        let mut rx = latch.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == Readiness::Lost))
            .await
            .expect("loss after reset in time")
            .expect("latch alive");
        assert!(!probe.is_finished());
        probe.abort();
    }

    #[tokio::test]
    async fn path_watch_ignores_readiness_it_did_not_observe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let latch = ReadinessLatch::new();
        latch.mark_ready();
        let probe = watch_path(dir.path().join("absent"), latch.clone());

        tokio::time::sleep(PROBE_INTERVAL * 3).await;
        assert_eq!(latch.state(), Readiness::Met);
        probe.abort();
    }
}

//! Supervision policies.
//!
//! Knobs that control **how often** the process supervisor retries and
//! **how long** it waits between attempts.
//!
//! ## Contents
//! - [`BackoffPolicy`] delay between spawn attempts (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization of those delays
//! - [`RestartBudget`] bounded crash-restart counter
//!
//! ## Quick wiring
//! ```text
//! LaunchSpec { max_start_retries, max_crash_restarts, backoff, .. }
//!      └─► ProcessSupervisor::launch uses:
//!           - backoff.delay(n) between spawn attempts
//!           - RestartBudget::new(max_crash_restarts) in the watchdog
//! ```

mod backoff;
mod restart;

pub use backoff::{BackoffPolicy, JitterPolicy};
pub use restart::RestartBudget;

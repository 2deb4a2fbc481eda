//! # External control surface.
//!
//! Everything outside the process reaches the session through this module.
//! Nothing here touches orchestrator state directly: every call becomes a
//! command on the control loop's queue.
//!
//! ```text
//! IPC caller ──► SessionInterface ──► SessionHandle ──► Command queue ──► Orchestrator::run
//!                     │                                                   └─ Launch → ProcessLauncher
//!                     │
//!                     ├──► SessionBackend (idle, lock, inhibit, VT switch)
//!                     ▼
//! backend events ──► handle_backend_event
//!                     ├─ Locked / Unlocked      → SessionLocked / SessionUnlocked on the bus
//!                     ├─ PrepareForSleep(true)  → lock()
//!                     └─ PrepareForShutdown(true) → logout()
//! ```
//!
//! [`SessionControl`] is the client side used by tools that end the session;
//! its `logout` succeeds when the session is already gone.

mod backend;
mod control;
mod handle;
mod interface;

pub use backend::{BackendCall, BackendEvent, FakeBackend, InhibitToken, SessionBackend};
pub use control::SessionControl;
pub use handle::SessionHandle;
pub use interface::SessionInterface;

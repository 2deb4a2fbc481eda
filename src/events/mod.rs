//! Session events and the bus that carries them.
//!
//! - [`Event`] / [`EventKind`]: what happened, to which module, with which pid, key or sink
//! - [`Bus`]: `tokio::sync::broadcast` wrapper shared by every publisher
//!
//! Publishers are the orchestrator, the process watchdogs, the environment
//! store, the IPC facade and the subscriber workers (overflow and panic
//! reports). The orchestrator's listener is the main consumer.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};

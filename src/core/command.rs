//! Messages marshaled onto the control loop.
//!
//! Handles, modules and the OS signal listener never touch orchestrator state;
//! they enqueue a [`Command`] and the loop applies it in arrival order.

use tokio::sync::oneshot;

use crate::error::SessionError;

#[derive(Debug)]
pub(crate) enum Command {
    Load(String),
    Unload(String),
    SetEnvironment { key: String, value: String },
    UnsetEnvironment(String),
    Logout {
        reason: String,
        module: Option<String>,
    },
    Launch {
        argv: Vec<String>,
        reply: oneshot::Sender<Result<u32, SessionError>>,
    },
    Removed(String),
    /// Answered once every earlier command has been applied.
    Sync(oneshot::Sender<()>),
}

use tokio::sync::{mpsc, oneshot};

use crate::core::Command;
use crate::error::SessionError;

/// Cloneable sender side of the control loop.
///
/// Every method enqueues a command. The async ones also wait until the loop
/// has applied it, so a caller observes its own writes.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.tx.send(cmd).map_err(|_| SessionError::Closed)
    }

    /// Waits until every command sent before this call has been applied.
    ///
    /// Commands sent while modules are still starting are applied once
    /// startup completes.
    pub async fn sync(&self) -> Result<(), SessionError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Sync(ack))?;
        done.await.map_err(|_| SessionError::Closed)
    }

    /// Starts module `name` on demand.
    pub async fn load(&self, name: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Load(name.into()))?;
        self.sync().await
    }

    /// Stops module `name`.
    pub async fn unload(&self, name: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Unload(name.into()))?;
        self.sync().await
    }

    /// Sets one session environment variable.
    pub async fn set_environment(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.send(Command::SetEnvironment {
            key: key.into(),
            value: value.into(),
        })?;
        self.sync().await
    }

    /// Removes one session environment variable.
    pub async fn unset_environment(&self, key: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::UnsetEnvironment(key.into()))?;
        self.sync().await
    }

    /// Starts a pre-split command inside the session environment; returns its pid.
    ///
    /// Requests sent while modules are still starting run once startup completes.
    pub async fn launch_command<I, S>(&self, argv: I) -> Result<u32, SessionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (reply, result) = oneshot::channel();
        self.send(Command::Launch {
            argv: argv.into_iter().map(Into::into).collect(),
            reply,
        })?;
        result.await.map_err(|_| SessionError::Closed)?
    }

    /// Requests the end of the session.
    ///
    /// Only enqueues the request, so it is safe to call from a signal listener.
    pub fn logout(&self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Logout {
            reason: reason.into(),
            module: None,
        })
    }

    /// True once the control loop has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

use tracing::debug;

use super::SessionHandle;
use crate::error::SessionError;

/// Client used by tools that end the session (a logout button, a script).
#[derive(Clone, Debug, Default)]
pub struct SessionControl {
    handle: Option<SessionHandle>,
}

impl SessionControl {
    /// Client bound to a running session.
    pub fn new(handle: SessionHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Client with no session to talk to.
    pub fn detached() -> Self {
        Self::default()
    }

    /// True while the session accepts requests.
    pub fn is_session_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }

    /// Asks the session to log out.
    ///
    /// A session that is absent or already gone is not an error.
    pub fn logout(&self) -> Result<(), SessionError> {
        let Some(handle) = &self.handle else {
            debug!("no session to log out from");
            return Ok(());
        };
        match handle.logout("logout requested by session control") {
            Err(SessionError::Closed) => {
                debug!("session already gone");
                Ok(())
            }
            other => other,
        }
    }
}

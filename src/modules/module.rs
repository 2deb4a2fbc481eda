//! # Module trait.
//!
//! ## Rules
//! - `phase()` is read once, at registration, and must not change.
//! - `start()` resolves once the module is up (or has failed). A module with an
//!   external process resolves after readiness, or after the readiness timeout
//!   with the process alive.
//! - `stop()` must tolerate being called after a failed or partial start.
//! - Environment changes are requested through the [`ModuleLink`](super::ModuleLink),
//!   never applied directly.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ModuleContext, Phase};
use crate::environment::EnvironmentMap;
use crate::error::ModuleError;

/// One unit of session functionality.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Startup bucket.
    fn phase(&self) -> Phase;

    /// Brings the module up.
    async fn start(&self, ctx: ModuleContext) -> Result<(), ModuleError>;

    /// Tears the module down.
    async fn stop(&self) -> Result<(), ModuleError>;

    /// Called on running modules after every session environment change.
    fn environment_changed(&self, _env: &EnvironmentMap) {}
}

/// Shared handle to a module.
pub type ModuleRef = Arc<dyn Module>;

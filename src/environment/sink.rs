//! Propagation targets.

use std::sync::Arc;

use async_trait::async_trait;

use super::EnvironmentMap;
use crate::core::InitSystem;
use crate::error::BoxError;

/// A consumer of the session environment.
///
/// `push` always receives the complete exportable map, never a delta.
/// Implementations must be idempotent: the same map may arrive repeatedly.
#[async_trait]
pub trait EnvironmentSink: Send + Sync + 'static {
    /// Name used in logs and `PropagationFailed` events.
    fn name(&self) -> &str;

    /// Replaces the sink's view of the environment with `env`.
    async fn push(&self, env: &EnvironmentMap) -> Result<(), BoxError>;
}

/// Pushes the environment into the init system's global (manager) environment.
///
/// Registered automatically in delegated mode.
pub struct InitSystemSink {
    init: Arc<dyn InitSystem>,
}

impl InitSystemSink {
    /// Wraps an init system.
    pub fn new(init: Arc<dyn InitSystem>) -> Self {
        Self { init }
    }
}

#[async_trait]
impl EnvironmentSink for InitSystemSink {
    fn name(&self) -> &str {
        "init-system"
    }

    async fn push(&self, env: &EnvironmentMap) -> Result<(), BoxError> {
        self.init.set_global_environment(env).await
    }
}

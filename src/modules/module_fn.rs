//! # Function-backed module (`ModuleFn`)
//!
//! [`ModuleFn`] wraps a closure `F: Fn(ModuleContext) -> Fut` that produces a
//! fresh start future per call. Shared state between `start` and `stop` goes in
//! an explicit `Arc<...>` captured by both closures.
//!
//! ## Example
//! ```rust
//! use sessionvisor::{Module, ModuleContext, ModuleError, ModuleFn, ModuleRef, Phase};
//!
//! let m: ModuleRef = ModuleFn::arc(Phase::Init, |ctx: ModuleContext| async move {
//!     ctx.link()
//!         .set_environment("GTK_USE_PORTAL", "1")
//!         .map_err(|e| ModuleError::start(e.to_string()))
//! });
//!
//! assert_eq!(m.phase(), Phase::Init);
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::{Module, ModuleContext, Phase};
use crate::error::ModuleError;

type StopFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), ModuleError>> + Send + Sync>;

/// Closure-backed module.
pub struct ModuleFn<F> {
    phase: Phase,
    start: F,
    stop: Option<StopFn>,
}

impl<F> ModuleFn<F> {
    /// Creates a module whose `stop` does nothing.
    pub fn new(phase: Phase, start: F) -> Self {
        Self {
            phase,
            start,
            stop: None,
        }
    }

    /// Creates the module and returns it as a shared handle.
    pub fn arc(phase: Phase, start: F) -> Arc<Self> {
        Arc::new(Self::new(phase, start))
    }

    /// Sets the stop operation.
    pub fn with_stop<S, Fut>(mut self, stop: S) -> Self
    where
        S: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
    {
        self.stop = Some(Box::new(move || Box::pin(stop())));
        self
    }
}

#[async_trait]
impl<F, Fut> Module for ModuleFn<F>
where
    F: Fn(ModuleContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ModuleError>> + Send + 'static,
{
    fn phase(&self) -> Phase {
        self.phase
    }

    async fn start(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        (self.start)(ctx).await
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        match &self.stop {
            Some(stop) => stop().await,
            None => Ok(()),
        }
    }
}

//! # Session modules.
//!
//! A module is one facet of the session (locale, autostart, the shell, a
//! background service) with a fixed [`Phase`] and `start`/`stop` operations.
//!
//! ## Contents
//! - [`Module`]: the capability interface the orchestrator drives
//! - [`ModuleContext`] / [`ModuleLink`]: what a module receives at start and how it talks back
//! - [`ModuleFn`]: closure-backed module
//! - built-ins: [`LocaleModule`], [`AutostartModule`], [`ProcessModule`]

mod autostart;
mod context;
mod locale;
mod module;
mod module_fn;
mod phase;
mod process;

use std::sync::Arc;

pub use autostart::AutostartModule;
pub use context::{ModuleContext, ModuleLink};
pub use locale::{LocaleModule, locale_environment};
pub use module::{Module, ModuleRef};
pub use module_fn::ModuleFn;
pub use phase::Phase;
pub use process::ProcessModule;

use crate::config::{Flavor, SessionConfig};

/// Built-in modules for `cfg`, in discovery order.
///
/// The daemon flavor has no built-ins; its modules come from manifests.
pub fn builtins(cfg: &SessionConfig) -> Vec<(&'static str, ModuleRef)> {
    if cfg.flavor == Flavor::Daemon {
        return Vec::new();
    }
    let mut out: Vec<(&'static str, ModuleRef)> = vec![
        ("locale", Arc::new(LocaleModule::new(cfg.locale.clone()))),
        (
            "autostart",
            Arc::new(AutostartModule::new(cfg.autostart.clone(), cfg.stop_grace)),
        ),
    ];
    if let Some(shell) = &cfg.shell {
        out.push((
            "shell",
            Arc::new(ProcessModule::new(shell.clone(), cfg.supervision())),
        ));
    }
    out
}

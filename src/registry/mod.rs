//! # Plugin discovery.
//!
//! [`PluginRegistry`] collects candidate modules from the built-in list and
//! from `*.toml` manifests, validates each one, and exposes the accepted set
//! by stable name in discovery order.
//!
//! ## Validation
//! ```text
//! candidate ──► iid + metadata present?      no ─► MissingMetadata
//!           ──► iid == expected?             no ─► WrongInterface
//!           ──► metadata.id present?         no ─► MissingId
//!           ──► metadata.type == kind?       no ─► WrongType
//!           ──► id not taken yet?            no ─► Duplicate
//!           ──► accepted (autoload = metadata.autoload, default true)
//! ```
//!
//! A rejected candidate is logged and skipped; discovery itself never fails.
//!
//! ## Manifest format
//! ```toml
//! iid = "io.sessionvisor.Module/1"
//!
//! [metadata]
//! id = "notifications"
//! type = "SessionModule"
//! autoload = false
//!
//! [process]
//! program = "/usr/libexec/notifyd"
//! phase = "init"
//! ```

mod candidate;
mod manifest;
mod plugin_registry;

pub use candidate::{Plugin, PluginCandidate};
pub use plugin_registry::{PluginRegistry, Rejection};

/// Interface identifier every module plugin must declare.
pub const MODULE_IID: &str = "io.sessionvisor.Module/1";

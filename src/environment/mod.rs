//! # Session environment.
//!
//! [`EnvironmentStore`] owns the session's variables and is their only mutator.
//! Every change is applied locally first, then the **whole** exportable map is
//! pushed to each registered [`EnvironmentSink`].
//!
//! ```text
//! set / unset ──► local map ──► filter::exportable() ──► sink 1 (timeout)
//!                    │                                 ├─► sink 2 (timeout)
//!                    │                                 └─► sink N (timeout)
//!                    └──► snapshot() (unfiltered; inherited by spawned programs)
//! ```

pub mod defaults;
mod filter;
mod sink;
mod store;

use std::collections::BTreeMap;

pub use filter::{SESSION_LOCAL_KEYS, exportable, is_exportable};
pub use sink::{EnvironmentSink, InitSystemSink};
pub use store::EnvironmentStore;

/// Variable name → value.
pub type EnvironmentMap = BTreeMap<String, String>;

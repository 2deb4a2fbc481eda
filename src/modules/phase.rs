//! # Startup phases.
//!
//! ```text
//! start:  EarlyInit ──► Init ──► WindowManager ──► Applications
//! stop:   reverse of the recorded load order (not of the phase order)
//! ```

use std::fmt;

use serde::Deserialize;

/// Ordered startup bucket of a module.
///
/// Modules of a lower phase are started (and confirmed running) before any
/// module of a higher phase begins starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Before anything else (locale, environment setup).
    EarlyInit,
    /// Core services.
    Init,
    /// The shell / compositor.
    WindowManager,
    /// User applications (autostart).
    Applications,
}

impl Phase {
    /// All phases in start order.
    pub const ALL: [Phase; 4] = [
        Phase::EarlyInit,
        Phase::Init,
        Phase::WindowManager,
        Phase::Applications,
    ];

    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::EarlyInit => "early-init",
            Phase::Init => "init",
            Phase::WindowManager => "window-manager",
            Phase::Applications => "applications",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered_by_start_sequence() {
        let mut shuffled = vec![
            Phase::Applications,
            Phase::EarlyInit,
            Phase::WindowManager,
            Phase::Init,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Phase::ALL.to_vec());
    }

    #[test]
    fn deserializes_from_kebab_case() {
        #[derive(Deserialize)]
        struct Wrap {
            phase: Phase,
        }
        let w: Wrap = toml::from_str(r#"phase = "window-manager""#).expect("parse");
        assert_eq!(w.phase, Phase::WindowManager);
    }
}

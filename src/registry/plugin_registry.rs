use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use super::{MODULE_IID, Plugin, PluginCandidate, manifest};
use crate::config::SessionConfig;
use crate::error::DiscoveryError;
use crate::modules::{self, ModuleRef};
use crate::process::Supervision;

/// A candidate that did not pass validation.
#[derive(Clone, Debug)]
pub struct Rejection {
    /// Where the candidate came from.
    pub source: String,
    /// Its id, when it declared one.
    pub id: Option<String>,
    /// Why it was rejected.
    pub error: DiscoveryError,
}

/// Validated set of module plugins, in discovery order.
pub struct PluginRegistry {
    iid: String,
    kind: String,
    candidates: Vec<PluginCandidate>,
    dirs: Vec<PathBuf>,
    supervision: Supervision,
    plugins: Vec<Plugin>,
    rejected: Vec<Rejection>,
    discovered: bool,
}

impl PluginRegistry {
    /// Empty registry accepting modules of `kind` (e.g. `"SessionModule"`).
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            iid: MODULE_IID.to_string(),
            kind: kind.into(),
            candidates: Vec::new(),
            dirs: Vec::new(),
            supervision: Supervision::default(),
            plugins: Vec::new(),
            rejected: Vec::new(),
            discovered: false,
        }
    }

    /// Registry for `cfg`: its flavor's module kind, the built-in modules and
    /// the configured plugin directories.
    pub fn for_config(cfg: &SessionConfig) -> Self {
        let mut registry = Self::new(cfg.flavor.module_kind()).with_supervision(cfg.supervision());
        for (id, instance) in modules::builtins(cfg) {
            registry = registry.with_builtin(id, instance);
        }
        for dir in &cfg.plugin_dirs {
            registry = registry.with_plugin_dir(dir.clone());
        }
        registry
    }

    /// Overrides the expected interface identifier.
    pub fn with_interface(mut self, iid: impl Into<String>) -> Self {
        self.iid = iid.into();
        self
    }

    /// Adds a raw candidate.
    pub fn with_candidate(mut self, candidate: PluginCandidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    /// Adds a well-formed built-in module under `id`.
    pub fn with_builtin(self, id: &str, instance: ModuleRef) -> Self {
        let candidate = PluginCandidate::builtin(id, &self.kind, instance);
        self.with_candidate(candidate)
    }

    /// Adds a directory scanned for manifests.
    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    /// Supervision limits for manifest-defined process modules.
    pub fn with_supervision(mut self, supervision: Supervision) -> Self {
        self.supervision = supervision;
        self
    }

    /// Validates built-in candidates, then manifests. Runs once.
    ///
    /// Returns the rejected candidates (already logged).
    pub fn discover(&mut self) -> &[Rejection] {
        if self.discovered {
            return &self.rejected;
        }
        self.discovered = true;

        for candidate in std::mem::take(&mut self.candidates) {
            self.admit(candidate);
        }
        for path in manifest::manifest_paths(&self.dirs) {
            match manifest::load(&path, self.supervision) {
                Ok(candidate) => self.admit(candidate),
                Err(error) => self.reject(path.display().to_string(), None, error),
            }
        }
        &self.rejected
    }

    fn admit(&mut self, candidate: PluginCandidate) {
        let declared_id = candidate
            .metadata
            .as_ref()
            .and_then(|m| m.get("id"))
            .and_then(toml::Value::as_str)
            .map(str::to_string);

        match self.validate(&candidate) {
            Ok((name, autoload)) => self.plugins.push(Plugin {
                name,
                metadata: candidate.metadata.unwrap_or_default(),
                instance: candidate.instance,
                autoload,
            }),
            Err(error) => self.reject(candidate.source, declared_id, error),
        }
    }

    fn validate(&self, candidate: &PluginCandidate) -> Result<(String, bool), DiscoveryError> {
        let (Some(iid), Some(metadata)) = (&candidate.iid, &candidate.metadata) else {
            return Err(DiscoveryError::MissingMetadata);
        };
        if *iid != self.iid {
            return Err(DiscoveryError::WrongInterface {
                expected: self.iid.clone(),
                found: iid.clone(),
            });
        }
        let Some(id) = metadata.get("id").and_then(toml::Value::as_str) else {
            return Err(DiscoveryError::MissingId);
        };
        let kind = metadata.get("type").and_then(toml::Value::as_str);
        if kind != Some(self.kind.as_str()) {
            return Err(DiscoveryError::WrongType {
                id: id.to_string(),
                expected: self.kind.clone(),
                found: kind.unwrap_or("none").to_string(),
            });
        }
        if self.plugins.iter().any(|p| p.name == id) {
            return Err(DiscoveryError::Duplicate { id: id.to_string() });
        }
        let autoload = metadata
            .get("autoload")
            .and_then(toml::Value::as_bool)
            .unwrap_or(true);
        Ok((id.to_string(), autoload))
    }

    fn reject(&mut self, source: String, id: Option<String>, error: DiscoveryError) {
        warn!(source = %source, error = %error, label = error.as_label(), "plugin rejected");
        self.rejected.push(Rejection { source, id, error });
    }

    /// Accepted plugins, in discovery order.
    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// Rejected candidates.
    pub fn rejected(&self) -> &[Rejection] {
        &self.rejected
    }

    /// Names of the accepted plugins, in discovery order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    /// Module registered under `name`.
    pub fn get_instance(&self, name: &str) -> Option<ModuleRef> {
        self.find(name).map(|p| Arc::clone(&p.instance))
    }

    /// Name under which `instance` is registered (pointer identity).
    pub fn get_name_for(&self, instance: &ModuleRef) -> Option<&str> {
        self.plugins
            .iter()
            .find(|p| std::ptr::addr_eq(Arc::as_ptr(&p.instance), Arc::as_ptr(instance)))
            .map(|p| p.name.as_str())
    }

    /// Metadata of `name`.
    pub fn metadata(&self, name: &str) -> Option<&toml::Table> {
        self.find(name).map(|p| &p.metadata)
    }

    fn find(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModuleError;
    use crate::modules::{ModuleContext, ModuleFn, Phase};

    fn module(phase: Phase) -> ModuleRef {
        ModuleFn::arc(phase, |_ctx: ModuleContext| async { Ok::<_, ModuleError>(()) })
    }

    #[test]
    fn rejects_malformed_candidates_and_keeps_the_rest() {
        let good = module(Phase::Init);
        let mut no_meta = PluginCandidate::builtin("x", "SessionModule", module(Phase::Init));
        no_meta.metadata = None;
        let mut wrong_iid = PluginCandidate::builtin("y", "SessionModule", module(Phase::Init));
        wrong_iid.iid = Some("org.other.Plugin".into());
        let mut no_id = PluginCandidate::builtin("z", "SessionModule", module(Phase::Init));
        no_id.metadata.as_mut().expect("meta").remove("id");

        let mut registry = PluginRegistry::new("SessionModule")
            .with_candidate(no_meta)
            .with_builtin("good", good.clone())
            .with_candidate(wrong_iid)
            .with_candidate(PluginCandidate::builtin("daemon", "DaemonModule", module(Phase::Init)))
            .with_candidate(no_id)
            .with_builtin("good", module(Phase::Applications));

        let labels: Vec<_> = registry.discover().iter().map(|r| r.error.as_label()).collect();
        assert_eq!(
            labels,
            vec![
                "discovery_missing_metadata",
                "discovery_wrong_interface",
                "discovery_wrong_type",
                "discovery_missing_id",
                "discovery_duplicate",
            ]
        );
        assert_eq!(registry.names(), vec!["good"]);
        assert_eq!(registry.get_name_for(&good), Some("good"));
        assert_eq!(registry.get_instance("good").map(|m| m.phase()), Some(Phase::Init));
    }

    #[test]
    fn autoload_defaults_to_true() {
        let mut registry = PluginRegistry::new("DaemonModule")
            .with_builtin("always", module(Phase::Init))
            .with_candidate(
                PluginCandidate::builtin("lazy", "DaemonModule", module(Phase::Init))
                    .with_metadata("autoload", false),
            );
        assert!(registry.discover().is_empty());
        let autoload: Vec<_> = registry.plugins().iter().map(|p| p.autoload).collect();
        assert_eq!(autoload, vec![true, false]);
        assert!(registry.metadata("lazy").is_some());
    }

    #[test]
    fn foreign_instances_have_no_name() {
        let mut registry = PluginRegistry::new("SessionModule").with_builtin("a", module(Phase::Init));
        registry.discover();
        assert_eq!(registry.get_name_for(&module(Phase::Init)), None);
    }
}

#[cfg(test)]
mod manifest_tests {
    use super::*;
    use crate::modules::Phase;

    fn write(dir: &std::path::Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).expect("write manifest");
    }

    #[test]
    fn manifests_are_read_in_file_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "20-notify.toml",
            r#"
            iid = "io.sessionvisor.Module/1"
            [metadata]
            id = "notify"
            type = "SessionModule"
            autoload = false
            [process]
            program = "/bin/true"
            phase = "applications"
            "#,
        );
        write(
            dir.path(),
            "10-portal.toml",
            r#"
            iid = "io.sessionvisor.Module/1"
            [metadata]
            id = "portal"
            type = "SessionModule"
            [process]
            program = "/bin/true"
            "#,
        );
        write(dir.path(), "30-broken.toml", "iid = ");
        write(dir.path(), "README", "not a manifest");

        let mut registry = PluginRegistry::new("SessionModule").with_plugin_dir(dir.path());
        let rejected: Vec<_> = registry.discover().iter().map(|r| r.error.as_label()).collect();

        assert_eq!(rejected, vec!["discovery_manifest"]);
        assert_eq!(registry.names(), vec!["portal", "notify"]);
        assert_eq!(registry.get_instance("portal").map(|m| m.phase()), Some(Phase::Init));
        assert_eq!(
            registry.get_instance("notify").map(|m| m.phase()),
            Some(Phase::Applications)
        );
        assert!(!registry.plugins()[1].autoload);
    }

    #[test]
    fn manifest_without_process_table_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "a.toml",
            r#"
            iid = "io.sessionvisor.Module/1"
            [metadata]
            id = "a"
            type = "SessionModule"
            "#,
        );
        let mut registry = PluginRegistry::new("SessionModule").with_plugin_dir(dir.path());
        assert_eq!(registry.discover().len(), 1);
        assert!(registry.names().is_empty());
    }

    #[test]
    fn discovery_runs_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "bad.toml", "[[");
        let mut registry = PluginRegistry::new("SessionModule").with_plugin_dir(dir.path());
        assert_eq!(registry.discover().len(), 1);
        assert_eq!(registry.discover().len(), 1);
    }
}

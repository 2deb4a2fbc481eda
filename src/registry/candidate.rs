use crate::modules::ModuleRef;

use super::MODULE_IID;

/// A module offered to the registry, not yet validated.
#[derive(Clone)]
pub struct PluginCandidate {
    /// Where the candidate came from (`builtin:<id>` or a manifest path).
    pub source: String,
    /// Declared interface identifier.
    pub iid: Option<String>,
    /// Declared metadata (`id`, `type`, optional `autoload`).
    pub metadata: Option<toml::Table>,
    /// The module itself.
    pub instance: ModuleRef,
}

impl PluginCandidate {
    /// A well-formed built-in candidate of the given module kind.
    pub fn builtin(id: &str, kind: &str, instance: ModuleRef) -> Self {
        let mut metadata = toml::Table::new();
        metadata.insert("id".into(), toml::Value::String(id.to_string()));
        metadata.insert("type".into(), toml::Value::String(kind.to_string()));
        Self {
            source: format!("builtin:{id}"),
            iid: Some(MODULE_IID.to_string()),
            metadata: Some(metadata),
            instance,
        }
    }

    /// Sets one metadata key (creating the table if needed).
    pub fn with_metadata(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.metadata
            .get_or_insert_with(toml::Table::new)
            .insert(key.to_string(), value.into());
        self
    }
}

/// An accepted module.
#[derive(Clone)]
pub struct Plugin {
    /// Stable unique name (the metadata `id`).
    pub name: String,
    /// Full metadata table.
    pub metadata: toml::Table,
    /// The module.
    pub instance: ModuleRef,
    /// Started with the session (`true`) or only on demand.
    pub autoload: bool,
}

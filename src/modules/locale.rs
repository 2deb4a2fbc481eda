//! # Locale module.
//!
//! Publishes the user's language and regional formats as `LANG`/`LC_*`
//! variables at the very start of the session, so every later module and
//! program inherits them.

use async_trait::async_trait;
use tracing::debug;

use super::{Module, ModuleContext, Phase};
use crate::config::LocaleConfig;
use crate::error::ModuleError;

const LANGUAGE_KEYS: [&str; 3] = ["LANG", "LANGUAGE", "LC_MESSAGES"];

const REGION_KEYS: [&str; 11] = [
    "LC_CTYPE",
    "LC_NUMERIC",
    "LC_TIME",
    "LC_COLLATE",
    "LC_MONETARY",
    "LC_PAPER",
    "LC_NAME",
    "LC_ADDRESS",
    "LC_TELEPHONE",
    "LC_MEASUREMENT",
    "LC_IDENTIFICATION",
];

/// Variables derived from a language and a region, in the order they are set.
pub fn locale_environment(language: &str, region: &str) -> Vec<(&'static str, String)> {
    LANGUAGE_KEYS
        .iter()
        .map(|k| (*k, language.to_string()))
        .chain(REGION_KEYS.iter().map(|k| (*k, region.to_string())))
        .collect()
}

/// Sets the locale variables from configuration, falling back to the inherited `LANG`.
pub struct LocaleModule {
    cfg: LocaleConfig,
}

impl LocaleModule {
    /// Creates the module.
    pub fn new(cfg: LocaleConfig) -> Self {
        Self { cfg }
    }
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.filter(|s| !s.is_empty()).cloned()
}

#[async_trait]
impl Module for LocaleModule {
    fn phase(&self) -> Phase {
        Phase::EarlyInit
    }

    async fn start(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        let system = non_empty(ctx.environment().get("LANG"));
        let language = non_empty(self.cfg.language.as_ref()).or_else(|| system.clone());
        let region = non_empty(self.cfg.region.as_ref()).or(system);

        let (Some(language), Some(region)) = (language, region) else {
            debug!(module = ctx.name(), "no locale configured or inherited");
            return Ok(());
        };

        for (key, value) in locale_environment(&language, &region) {
            ctx.link()
                .set_environment(key, value)
                .map_err(|e| ModuleError::start(e.to_string()))?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ModuleError> {
        Ok(())
    }
}

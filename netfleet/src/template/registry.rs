//! Template registry: load once, cache compiled.
//!
//! The registry is an injected strategy object, not a global: each consumer
//! holds a shared handle and every template is compiled at most once per
//! registry. Lookups for templates that exist nowhere are a configuration
//! error and fail the calling task.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use log::debug;

use super::builtin;
use super::definition::Template;
use crate::error::TemplateError;

/// Named template store with a compile-once cache.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    /// In-memory sources, checked before the directory.
    sources: HashMap<String, String>,

    /// Optional directory of `<name>.template` files.
    dir: Option<PathBuf>,

    cache: RwLock<HashMap<String, Arc<Template>>>,
}

impl TemplateRegistry {
    /// Registry with no templates at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry preloaded with the bundled per-dialect template sources.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        for (name, source) in builtin::SOURCES {
            registry.register(*name, *source);
        }
        registry
    }

    /// Also look for `<name>.template` files under `dir`.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Register (or replace) a template source under a name.
    pub fn register(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }

    /// Fetch a compiled template, compiling and caching on first use.
    pub fn get(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        {
            let cache = self.cache.read().expect("template cache lock poisoned");
            if let Some(template) = cache.get(name) {
                return Ok(Arc::clone(template));
            }
        }

        let source = match self.sources.get(name) {
            Some(source) => source.clone(),
            None => self.read_from_dir(name)?,
        };

        debug!("Compiling template '{name}'");
        let template = Arc::new(Template::parse(&source)?);
        let mut cache = self.cache.write().expect("template cache lock poisoned");
        Ok(Arc::clone(
            cache
                .entry(name.to_string())
                .or_insert(template),
        ))
    }

    fn read_from_dir(&self, name: &str) -> Result<String, TemplateError> {
        let Some(dir) = &self.dir else {
            return Err(TemplateError::NotFound {
                name: name.to_string(),
            });
        };
        let path = dir.join(format!("{name}.template"));
        fs::read_to_string(&path).map_err(|_| TemplateError::NotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::names;

    #[test]
    fn test_missing_template_is_configuration_error() {
        let registry = TemplateRegistry::empty();
        let err = registry.get("no_such_template").unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { name } if name == "no_such_template"));
    }

    #[test]
    fn test_builtin_templates_resolve() {
        let registry = TemplateRegistry::builtin();
        registry.get(names::ROUTEROS_SYSTEM_RESOURCE).unwrap();
        registry.get(names::QTECH_SHOW_VERSION).unwrap();
    }

    #[test]
    fn test_compiled_once_and_shared() {
        let registry = TemplateRegistry::builtin();
        let first = registry.get(names::IOS_SHOW_VERSION).unwrap();
        let second = registry.get(names::IOS_SHOW_VERSION).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_registered_source_overrides() {
        let mut registry = TemplateRegistry::builtin();
        registry.register("custom", "Value v (\\S+)\n\nStart\n  ^v=${v} -> Record\n");
        let template = registry.get("custom").unwrap();
        let records = template.parse_text("v=42\n").unwrap();
        assert_eq!(records[0]["v"].as_str(), "42");
    }

    #[test]
    fn test_directory_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("disk_template.template"),
            "Value v (\\S+)\n\nStart\n  ^v=${v} -> Record\n",
        )
        .unwrap();

        let registry = TemplateRegistry::empty().with_dir(dir.path());
        let template = registry.get("disk_template").unwrap();
        assert_eq!(template.header().collect::<Vec<_>>(), vec!["v"]);
    }
}

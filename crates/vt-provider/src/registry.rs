//! Provider registry
//!
//! Built once at startup and passed to every component that dispatches to a
//! provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ProviderError, Result};
use crate::provider::Provider;

#[derive(Clone, Default)]
pub struct Registry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own name, replacing any previous entry
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        tracing::debug!(provider = %name, "Registering provider");
        self.providers.insert(name, provider);
    }

    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider; `None` means not registered
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Like [`Registry::get`], but as an error
    pub fn require(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.get(name)
            .ok_or_else(|| ProviderError::NotRegistered(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusReport;
    use async_trait::async_trait;
    use vt_core::Template;

    struct Named(&'static str);

    #[async_trait]
    impl Provider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn start(&self, _template: &Template) -> Result<()> {
            Ok(())
        }

        async fn stop(&self, _template: &Template) -> Result<()> {
            Ok(())
        }

        async fn status(&self, _template: &Template) -> Result<StatusReport> {
            Ok(StatusReport::default())
        }
    }

    #[test]
    fn test_get_is_total() {
        let registry = Registry::new()
            .with(Arc::new(Named("docker-compose")))
            .with(Arc::new(Named("compose")));

        for name in registry.names() {
            let provider = registry.get(name).unwrap();
            assert_eq!(provider.name(), name);
        }

        for name in ["", "kubernetes", "DOCKER-COMPOSE", "compose "] {
            assert!(registry.get(name).is_none());
            assert!(matches!(
                registry.require(name),
                Err(ProviderError::NotRegistered(_))
            ));
        }
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = Registry::new()
            .with(Arc::new(Named("z")))
            .with(Arc::new(Named("a")));
        assert_eq!(registry.names(), vec!["a", "z"]);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Named("p")));
        registry.register(Arc::new(Named("p")));
        assert_eq!(registry.providers().count(), 1);
        assert!(!registry.is_empty());
    }
}

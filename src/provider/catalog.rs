use std::collections::HashMap;
use std::sync::Arc;

use super::{DryRunProvider, Provider, ProviderError};
use crate::config::ProviderConfig;

/// Builds an adapter for a provider entry: `(entry name, entry config)`
pub type ProviderFactory =
    Arc<dyn Fn(&str, &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync>;

/// Maps provider kinds to adapter factories
///
/// The catalog is how concrete cloud backends plug into the orchestrator:
/// provider initialization looks up each enabled entry's kind here.
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    factories: HashMap<String, ProviderFactory>,
    fallback: Option<ProviderFactory>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog that serves every kind with an in-process [`DryRunProvider`]
    pub fn dry_run() -> Self {
        Self::new().with_fallback(Arc::new(dry_run_factory))
    }

    pub fn with_factory(mut self, kind: impl Into<String>, factory: ProviderFactory) -> Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    /// Factory used for kinds without a dedicated entry
    pub fn with_fallback(mut self, factory: ProviderFactory) -> Self {
        self.fallback = Some(factory);
        self
    }

    pub fn supports(&self, kind: &str) -> bool {
        self.fallback.is_some() || self.factories.contains_key(kind)
    }

    /// Build the adapter for the entry `name`
    pub fn build(
        &self,
        name: &str,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        let kind = config.kind_or(name);
        let factory = self
            .factories
            .get(kind)
            .or(self.fallback.as_ref())
            .ok_or_else(|| ProviderError::UnsupportedKind(kind.to_string()))?;
        factory(name, config)
    }
}

fn dry_run_factory(
    name: &str,
    config: &ProviderConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    Ok(Arc::new(DryRunProvider::from_config(name, config)))
}

impl std::fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("ProviderCatalog")
            .field("kinds", &kinds)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let catalog = ProviderCatalog::new();
        let err = catalog
            .build("linode", &ProviderConfig::enabled())
            .err()
            .unwrap();
        assert_eq!(err, ProviderError::UnsupportedKind("linode".to_string()));
        assert!(!catalog.supports("linode"));
    }

    #[test]
    fn test_factory_selected_by_kind() {
        let catalog = ProviderCatalog::new().with_factory(
            "digitalocean",
            Arc::new(
                |name: &str, _: &ProviderConfig| -> Result<Arc<dyn Provider>, ProviderError> {
                    Ok(Arc::new(MockProvider::new(name)))
                },
            ),
        );
        let mut config = ProviderConfig::enabled();
        config.kind = Some("digitalocean".to_string());

        let provider = catalog.build("do-nyc", &config).unwrap();
        assert_eq!(provider.name(), "do-nyc");
        assert!(catalog.supports("digitalocean"));
    }

    #[test]
    fn test_dry_run_serves_every_kind() {
        let catalog = ProviderCatalog::dry_run();
        assert!(catalog.supports("anything"));
        let provider = catalog.build("gcp", &ProviderConfig::enabled()).unwrap();
        assert_eq!(provider.name(), "gcp");
    }
}

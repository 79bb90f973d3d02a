use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::Provider;

/// Concurrency-safe name -> adapter table
///
/// Registration overwrites: the last adapter registered under a name wins.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<DashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Every registered adapter, keyed by name
    pub fn get_all(&self) -> BTreeMap<String, Arc<dyn Provider>> {
        self.providers
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.get_all().into_keys().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

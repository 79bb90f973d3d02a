use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::cluster::OrchestratorError;
use crate::config::NetworkConfig;
use crate::provider::{NetworkOutput, ProviderRegistry};

/// Base private network per provider
#[derive(Debug, Default)]
pub struct NetworkManager {
    networks: BTreeMap<String, NetworkOutput>,
}

impl NetworkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the network on every registered provider that does not have one yet
    pub async fn create_networks(
        &mut self,
        registry: &ProviderRegistry,
        config: &NetworkConfig,
    ) -> Result<(), OrchestratorError> {
        for (name, provider) in registry.get_all() {
            if self.networks.contains_key(&name) {
                debug!("Network for {} already exists, skipping", name);
                continue;
            }
            let network = provider
                .create_network(config)
                .await
                .map_err(|source| OrchestratorError::Network {
                    name: name.clone(),
                    source,
                })?;
            info!("Created network {} ({}) on {}", network.name, network.cidr, name);
            self.networks.insert(name, network);
        }
        Ok(())
    }

    pub fn network_for(&self, provider: &str) -> Option<&NetworkOutput> {
        self.networks.get(provider)
    }

    pub fn networks(&self) -> &BTreeMap<String, NetworkOutput> {
        &self.networks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_networks_created_once_per_provider() {
        let registry = ProviderRegistry::new();
        let aws = Arc::new(MockProvider::new("aws"));
        registry.register("aws", aws.clone());
        registry.register("do", Arc::new(MockProvider::new("do")));

        let mut manager = NetworkManager::new();
        let config = NetworkConfig::default();
        manager.create_networks(&registry, &config).await.unwrap();
        manager.create_networks(&registry, &config).await.unwrap();

        assert_eq!(aws.network_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.networks().len(), 2);
        assert_eq!(manager.network_for("do").unwrap().cidr, "10.0.0.0/16");
    }

    #[tokio::test]
    async fn test_failure_names_provider() {
        let registry = ProviderRegistry::new();
        let gcp = MockProvider::new("gcp");
        gcp.fail_network.store(true, Ordering::SeqCst);
        registry.register("gcp", Arc::new(gcp));

        let mut manager = NetworkManager::new();
        let err = manager
            .create_networks(&registry, &NetworkConfig::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to create network for provider gcp: vpc limit reached"
        );
        assert!(manager.networks().is_empty());
    }
}

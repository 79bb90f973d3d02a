//! Cluster Orchestrator - runs the provisioning pipeline phase by phase
//!
//! The orchestrator owns the provider registry and the node inventory. Each
//! phase is a method; [`Orchestrator::deploy`] runs them in dependency
//! order and stops at the first failure, leaving whatever was created in
//! place. Teardown is separate ([`Orchestrator::cleanup`]) and best-effort.
//!
//! Managers for the optional subsystems (network, VPN, DNS, firewall,
//! bootstrap, storage, ingress) stay `None` until their phase runs.
//!
//! Node deployment and the inventory queries take `&self`, so a shared
//! orchestrator can deploy nodes from several tasks at once.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{DeployTarget, OrchestratorError};
use super::health_checker::{ClusterHealth, HealthChecker};
use super::inventory::NodeInventory;
use super::outputs::ClusterOutputs;
use super::verify::verify_node_distribution;
use crate::bootstrap::{
    plan_addons, AddonStep, BootstrapStep, IngressManager, RkeManager, StorageManager,
};
use crate::config::{ClusterConfig, ConfigValidator, NodeConfig, NodePool, ValidationResult};
use crate::infra::{DnsManager, FirewallManager, NetworkManager};
use crate::provider::{LoadBalancerOutput, NodeOutput, ProviderCatalog, ProviderRegistry};
use crate::ssh::{resolve_ssh_credentials, SshCredentials};
use crate::vpn::{prepare_vpn, VpnManager, VpnMode};

pub struct Orchestrator {
    config: Arc<ClusterConfig>,
    catalog: ProviderCatalog,
    registry: ProviderRegistry,
    inventory: NodeInventory,
    health_checker: HealthChecker,
    validator: ConfigValidator,
    run_id: Uuid,

    ssh: Option<SshCredentials>,
    vpn_mode: VpnMode,
    network_manager: Option<NetworkManager>,
    vpn_manager: Option<VpnManager>,
    dns_manager: Option<DnsManager>,
    firewall_manager: Option<FirewallManager>,
    rke_manager: Option<RkeManager>,
    storage_manager: Option<StorageManager>,
    ingress_manager: Option<IngressManager>,

    vpn_configs: BTreeMap<String, String>,
    bootstrap_plan: Vec<BootstrapStep>,
    addon_plan: Vec<AddonStep>,
    manifests: Vec<String>,
    load_balancers: Vec<LoadBalancerOutput>,
}

impl Orchestrator {
    /// Only the registry, inventory, health checker and validator exist after construction
    pub fn new(config: Arc<ClusterConfig>, catalog: ProviderCatalog) -> Self {
        Self {
            config,
            catalog,
            registry: ProviderRegistry::new(),
            inventory: NodeInventory::new(),
            health_checker: HealthChecker::default(),
            validator: ConfigValidator::new(),
            run_id: Uuid::new_v4(),
            ssh: None,
            vpn_mode: VpnMode::None,
            network_manager: None,
            vpn_manager: None,
            dns_manager: None,
            firewall_manager: None,
            rke_manager: None,
            storage_manager: None,
            ingress_manager: None,
            vpn_configs: BTreeMap::new(),
            bootstrap_plan: Vec::new(),
            addon_plan: Vec::new(),
            manifests: Vec::new(),
            load_balancers: Vec::new(),
        }
    }

    pub fn with_health_checker(mut self, health_checker: HealthChecker) -> Self {
        self.health_checker = health_checker;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &Arc<ClusterConfig> {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn inventory(&self) -> &NodeInventory {
        &self.inventory
    }

    pub fn health_checker(&self) -> &HealthChecker {
        &self.health_checker
    }

    pub fn validator(&self) -> &ConfigValidator {
        &self.validator
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn ssh_credentials(&self) -> Option<&SshCredentials> {
        self.ssh.as_ref()
    }

    pub fn vpn_mode(&self) -> VpnMode {
        self.vpn_mode
    }

    pub fn network_manager(&self) -> Option<&NetworkManager> {
        self.network_manager.as_ref()
    }

    pub fn vpn_manager(&self) -> Option<&VpnManager> {
        self.vpn_manager.as_ref()
    }

    pub fn dns_manager(&self) -> Option<&DnsManager> {
        self.dns_manager.as_ref()
    }

    pub fn firewall_manager(&self) -> Option<&FirewallManager> {
        self.firewall_manager.as_ref()
    }

    pub fn rke_manager(&self) -> Option<&RkeManager> {
        self.rke_manager.as_ref()
    }

    pub fn storage_manager(&self) -> Option<&StorageManager> {
        self.storage_manager.as_ref()
    }

    pub fn ingress_manager(&self) -> Option<&IngressManager> {
        self.ingress_manager.as_ref()
    }

    /// Rendered node-side VPN configuration by node name
    pub fn vpn_configs(&self) -> &BTreeMap<String, String> {
        &self.vpn_configs
    }

    pub fn bootstrap_plan(&self) -> &[BootstrapStep] {
        &self.bootstrap_plan
    }

    pub fn addon_plan(&self) -> &[AddonStep] {
        &self.addon_plan
    }

    /// Storage and ingress manifests rendered so far
    pub fn manifests(&self) -> &[String] {
        &self.manifests
    }

    pub fn load_balancers(&self) -> &[LoadBalancerOutput] {
        &self.load_balancers
    }

    /// Structural validation of the cluster document
    pub fn validate(&self) -> ValidationResult {
        self.validator.validate(&self.config)
    }

    fn require_providers(&self) -> Result<(), OrchestratorError> {
        if self.registry.is_empty() {
            Err(OrchestratorError::NoProvidersInitialized)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    /// Resolve the SSH key pair nodes will be provisioned with
    pub fn generate_ssh_keys(&mut self) -> Result<(), OrchestratorError> {
        let credentials = resolve_ssh_credentials(&self.config.security.ssh)?;
        info!(
            "Using SSH key {} for user {}",
            credentials.fingerprint, credentials.user
        );
        self.ssh = Some(credentials);
        Ok(())
    }

    /// Build, initialize and register an adapter for every enabled provider
    pub async fn initialize_providers(&self) -> Result<(), OrchestratorError> {
        let enabled = self.config.enabled_providers();
        if enabled.is_empty() {
            return Err(OrchestratorError::NoProvidersEnabled);
        }

        for (name, provider_config) in enabled {
            let init_error = |source| OrchestratorError::ProviderInit {
                name: name.clone(),
                source,
            };
            let provider = self.catalog.build(name, provider_config).map_err(init_error)?;
            provider.initialize(&self.config).await.map_err(init_error)?;
            info!(
                "Initialized provider {} ({})",
                name,
                provider_config.kind_or(name)
            );
            self.registry.register(name.clone(), provider);
        }
        Ok(())
    }

    pub async fn create_networking(&mut self) -> Result<(), OrchestratorError> {
        self.require_providers()?;
        let manager = self.network_manager.get_or_insert_with(NetworkManager::new);
        manager
            .create_networks(&self.registry, &self.config.network)
            .await
    }

    /// Select the overlay and validate its settings; node enrollment happens
    /// in [`Self::configure_vpn_mesh`] once nodes exist
    pub fn configure_vpn(&mut self) -> Result<(), OrchestratorError> {
        let (mode, manager) = prepare_vpn(&self.config.network)?;
        if mode != VpnMode::None {
            info!("VPN mode selected: {}", mode);
        }
        self.vpn_mode = mode;
        self.vpn_manager = manager;
        Ok(())
    }

    pub fn configure_dns(&mut self) -> Result<(), OrchestratorError> {
        self.require_providers()?;
        if self.dns_manager.is_none() {
            self.dns_manager = Some(DnsManager::new(self.config.network.dns.clone())?);
        }
        if let Some(dns) = self.dns_manager.as_mut() {
            dns.rebuild(&self.inventory);
            match dns.api_hostname() {
                Some(host) => info!("DNS configured, API at {}", host),
                None => debug!("No DNS domain configured"),
            }
        }
        Ok(())
    }

    /// Create one node and record it; nothing is recorded on failure
    pub async fn deploy_node(&self, node: &NodeConfig) -> Result<(), OrchestratorError> {
        let provider = self
            .registry
            .get(&node.provider)
            .ok_or_else(|| OrchestratorError::ProviderNotFound(node.provider.clone()))?;

        let output = provider.create_node(node).await?;
        debug!("Node {} created on {}", output.name, node.provider);
        self.inventory.append(&node.provider, vec![output]);
        Ok(())
    }

    /// Create a pool's nodes and record them all, in the order the provider returned them
    pub async fn deploy_node_pool(
        &self,
        name: &str,
        pool: &NodePool,
    ) -> Result<(), OrchestratorError> {
        let provider = self
            .registry
            .get(&pool.provider)
            .ok_or_else(|| OrchestratorError::ProviderNotFound(pool.provider.clone()))?;

        let outputs = provider.create_node_pool(pool).await?;
        info!(
            "Node pool {} deployed on {} ({} nodes)",
            name,
            pool.provider,
            outputs.len()
        );
        self.inventory.append(&pool.provider, outputs);
        Ok(())
    }

    /// Standalone nodes in order, then pools; stops at the first failure
    pub async fn deploy_all(&self) -> Result<(), OrchestratorError> {
        for node in &self.config.nodes {
            self.deploy_node(node)
                .await
                .map_err(|e| OrchestratorError::deploy(DeployTarget::Node, &node.name, e))?;
        }
        for (name, pool) in &self.config.node_pools {
            self.deploy_node_pool(name, pool)
                .await
                .map_err(|e| OrchestratorError::deploy(DeployTarget::NodePool, name, e))?;
        }
        Ok(())
    }

    /// Deploy every pool concurrently. All deployments settle before the
    /// first failure (in pool order) is returned; successful pools stay recorded.
    pub async fn deploy_pools_parallel(&self) -> Result<(), OrchestratorError> {
        let deployments = self.config.node_pools.iter().map(|(name, pool)| async move {
            self.deploy_node_pool(name, pool)
                .await
                .map_err(|e| OrchestratorError::deploy(DeployTarget::NodePool, name, e))
        });
        let results = futures::future::join_all(deployments).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!("{} of {} node pools failed to deploy", failed, results.len());
        }
        results.into_iter().collect()
    }

    pub fn verify_distribution(&self) -> Result<(), OrchestratorError> {
        verify_node_distribution(&self.config.node_pools, &self.inventory)?;
        info!("Node distribution verified ({} nodes)", self.inventory.len());
        Ok(())
    }

    /// Enroll deployed nodes in the selected mesh and render their configuration
    pub fn configure_vpn_mesh(&mut self) -> Result<(), OrchestratorError> {
        let Some(manager) = self.vpn_manager.as_mut() else {
            debug!("No VPN selected, skipping mesh configuration");
            return Ok(());
        };
        manager.add_nodes(&self.inventory.all_nodes())?;
        for node in manager.node_names() {
            let rendered = manager.render_node(&node)?;
            self.vpn_configs.insert(node, rendered);
        }
        info!(
            "{} mesh configured for {} nodes",
            manager.mode(),
            self.vpn_configs.len()
        );
        Ok(())
    }

    pub async fn configure_firewalls(&mut self) -> Result<(), OrchestratorError> {
        self.require_providers()?;
        if self.firewall_manager.is_none() {
            self.firewall_manager = Some(FirewallManager::new(
                &self.config.security,
                &self.config.network,
                self.vpn_mode,
            )?);
        }
        match self.firewall_manager.as_mut() {
            Some(firewall) => firewall.apply(&self.registry, &self.inventory).await,
            None => Ok(()),
        }
    }

    /// Inventory nodes with mesh addresses filled in where the VPN assigned one
    fn mesh_nodes(&self) -> Vec<NodeOutput> {
        let mut nodes = self.inventory.all_nodes();
        if let Some(vpn) = &self.vpn_manager {
            for node in nodes.iter_mut().filter(|n| n.vpn_ip.is_none()) {
                node.vpn_ip = vpn.address_of(&node.name);
            }
        }
        nodes
    }

    /// Plan the RKE2 bootstrap over the deployed nodes
    pub fn bootstrap_cluster(&mut self) -> Result<(), OrchestratorError> {
        let api_hostname = self.dns_manager.as_ref().and_then(DnsManager::api_hostname);
        let rke = RkeManager::new(
            &self.config.kubernetes,
            &self.config.network,
            self.mesh_nodes(),
            api_hostname,
        )?;
        self.bootstrap_plan = rke.plan()?;
        info!(
            "Cluster bootstrap planned for {} nodes",
            self.bootstrap_plan.len()
        );
        self.rke_manager = Some(rke);
        Ok(())
    }

    pub fn install_addons(&mut self) -> Result<(), OrchestratorError> {
        if self.rke_manager.is_none() {
            return Err(OrchestratorError::RkeNotInitialized("addons"));
        }
        self.addon_plan = plan_addons(&self.config.addons)?;
        info!("{} addons planned", self.addon_plan.len());
        Ok(())
    }

    pub async fn install_load_balancers(&mut self) -> Result<(), OrchestratorError> {
        let Some(lb) = &self.config.load_balancer else {
            debug!("No load balancer configured");
            return Ok(());
        };
        let provider = self
            .registry
            .get(&lb.provider)
            .ok_or_else(|| OrchestratorError::ProviderNotFound(lb.provider.clone()))?;

        let output = provider
            .create_load_balancer(lb)
            .await
            .map_err(OrchestratorError::LoadBalancer)?;
        info!("Load balancer {} available at {}", output.name, output.address);
        self.load_balancers.push(output);
        Ok(())
    }

    pub fn install_storage(&mut self) -> Result<(), OrchestratorError> {
        let Some(storage) = &self.config.storage else {
            return Ok(());
        };
        if self.rke_manager.is_none() {
            return Err(OrchestratorError::RkeNotInitialized("storage"));
        }
        let manager = StorageManager::new(storage)?;
        self.manifests.extend(manager.manifests()?);
        self.storage_manager = Some(manager);
        Ok(())
    }

    pub fn install_ingress(&mut self) -> Result<(), OrchestratorError> {
        let Some(ingress) = self.config.ingress.as_ref().filter(|i| i.enabled) else {
            return Ok(());
        };
        if self.rke_manager.is_none() {
            return Err(OrchestratorError::RkeNotInitialized("ingress"));
        }
        let manager = IngressManager::new(ingress);
        self.manifests.push(manager.manifest()?);
        self.ingress_manager = Some(manager);
        Ok(())
    }

    /// Snapshot of everything the run produced
    pub fn export_outputs(&mut self) -> ClusterOutputs {
        if let Some(dns) = self.dns_manager.as_mut() {
            dns.rebuild(&self.inventory);
        }
        let api_endpoint = self
            .dns_manager
            .as_ref()
            .and_then(DnsManager::api_endpoint)
            .or_else(|| {
                self.load_balancers
                    .first()
                    .map(|lb| format!("https://{}:{}", lb.address, super::KUBE_API_PORT))
            });

        ClusterOutputs {
            run_id: self.run_id,
            generated_at: Utc::now(),
            metadata: self.config.metadata.clone(),
            nodes: self.inventory.snapshot(),
            vpn_mode: self.vpn_mode,
            api_endpoint,
            ssh_fingerprint: self.ssh.as_ref().map(|s| s.fingerprint.clone()),
            networks: self
                .network_manager
                .as_ref()
                .map(|n| n.networks().clone())
                .unwrap_or_default(),
            dns_records: self
                .dns_manager
                .as_ref()
                .map(|d| d.records().to_vec())
                .unwrap_or_default(),
            load_balancers: self.load_balancers.clone(),
            addons: self.addon_plan.clone(),
        }
    }

    /// Run the whole pipeline, stopping at the first failing phase
    pub async fn deploy(&mut self) -> Result<ClusterOutputs, OrchestratorError> {
        info!(
            "Deploying cluster {} ({})",
            self.config.metadata.name, self.config.metadata.environment
        );

        info!("Phase: SSH credentials");
        self.generate_ssh_keys()?;
        info!("Phase: provider initialization");
        self.initialize_providers().await?;
        info!("Phase: networking");
        self.create_networking().await?;
        info!("Phase: VPN selection");
        self.configure_vpn()?;
        info!("Phase: DNS");
        self.configure_dns()?;
        info!("Phase: node deployment");
        self.deploy_all().await?;
        info!("Phase: distribution verification");
        self.verify_distribution()?;
        info!("Phase: VPN mesh");
        self.configure_vpn_mesh()?;
        info!("Phase: firewalls");
        self.configure_firewalls().await?;
        info!("Phase: cluster bootstrap");
        self.bootstrap_cluster()?;
        self.install_addons()?;
        info!("Phase: exposure");
        self.install_load_balancers().await?;
        self.install_storage()?;
        self.install_ingress()?;

        let outputs = self.export_outputs();
        info!(
            "Cluster {} deployed: {} nodes, VPN {}",
            outputs.metadata.name,
            outputs.node_count(),
            outputs.vpn_mode.as_str()
        );
        Ok(outputs)
    }

    /// Tear down every registered provider once. Always succeeds; failures are logged.
    pub async fn cleanup(&self) -> Result<(), OrchestratorError> {
        info!("Cleaning up {} providers", self.registry.len());
        for (name, provider) in self.registry.get_all() {
            match provider.cleanup().await {
                Ok(()) => info!("Provider {} cleaned up", name),
                Err(e) => error!(provider = %name, "Cleanup failed: {}", e),
            }
        }
        Ok(())
    }

    /// Probe deployed nodes
    pub async fn check_health(&self) -> ClusterHealth {
        self.health_checker.check(&self.inventory).await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_node_by_name(&self, name: &str) -> Result<NodeOutput, OrchestratorError> {
        self.inventory.get_node_by_name(name)
    }

    pub fn get_nodes_by_provider(
        &self,
        provider: &str,
    ) -> Result<Vec<NodeOutput>, OrchestratorError> {
        self.inventory.get_nodes_by_provider(provider)
    }

    pub fn get_master_nodes(&self) -> Vec<NodeOutput> {
        self.inventory.get_master_nodes()
    }

    pub fn get_worker_nodes(&self) -> Vec<NodeOutput> {
        self.inventory.get_worker_nodes()
    }
}

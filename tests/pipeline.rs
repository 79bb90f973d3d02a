//! End-to-end runs of the orchestrator through the public API
//!
//! Cluster documents are written to temp files and loaded the same way the
//! binary loads them; providers come from the dry-run catalog or from the
//! in-file adapter below.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::Builder;

use kubemesh::cluster::{CountScope, Orchestrator, OrchestratorError};
use kubemesh::config::{
    load_cluster_config, ClusterConfig, ConfigValidator, FirewallConfig, LoadBalancerConfig,
    NetworkConfig, NodeConfig, NodePool, ProviderConfig,
};
use kubemesh::provider::{
    LoadBalancerOutput, NetworkOutput, NodeOutput, Provider, ProviderCatalog, ProviderError,
    ProviderFactory,
};
use kubemesh::vpn::{VpnMode, WireGuardKeyPair};

const PUBLIC_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl test@kubemesh";

fn write_document(content: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn load(content: &str) -> ClusterConfig {
    let file = write_document(content);
    load_cluster_config(file.path()).unwrap()
}

fn multi_cloud_document(server_key: &str) -> String {
    format!(
        r#"
metadata:
  name: edge
  environment: staging
providers:
  hetzner:
    enabled: true
  vultr:
    enabled: true
    region: ewr
  linode:
    enabled: false
security:
  ssh:
    public_key: "{PUBLIC_KEY}"
network:
  wireguard:
    enabled: true
    server_endpoint: vpn.example.com:51820
    server_public_key: "{server_key}"
  dns:
    domain: k8s.example.com
node_pools:
  cp:
    provider: hetzner
    count: 3
    roles: [master, etcd]
  wk:
    provider: vultr
    count: 2
    roles: [worker]
load_balancer:
  name: api
  provider: hetzner
  ports:
    - port: 6443
      target_port: 6443
"#
    )
}

/// Adapter that always comes up one node short of what a pool asks for
struct ShortPoolProvider {
    name: String,
    pool_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Provider for ShortPoolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn regions(&self) -> Vec<String> {
        vec!["lab-1".to_string()]
    }

    fn sizes(&self) -> Vec<String> {
        vec!["tiny".to_string()]
    }

    async fn initialize(&self, _config: &ClusterConfig) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn create_node(&self, node: &NodeConfig) -> Result<NodeOutput, ProviderError> {
        Ok(NodeOutput::new(&node.name, &self.name).with_public_ip("198.51.100.1"))
    }

    async fn create_node_pool(&self, pool: &NodePool) -> Result<Vec<NodeOutput>, ProviderError> {
        self.pool_calls.fetch_add(1, Ordering::SeqCst);
        let role = pool.roles.first().cloned().unwrap_or_default();
        Ok((1..pool.count)
            .map(|i| {
                NodeOutput::new(format!("{}-{}", pool.name, i), &self.name)
                    .with_public_ip(format!("198.51.100.{}", i + 1))
                    .with_role(role.clone())
            })
            .collect())
    }

    async fn create_network(
        &self,
        network: &NetworkConfig,
    ) -> Result<NetworkOutput, ProviderError> {
        Ok(NetworkOutput {
            id: "lab-net".to_string(),
            name: "lab-net".to_string(),
            provider: self.name.clone(),
            cidr: network.cidr.clone(),
            region: "lab-1".to_string(),
        })
    }

    async fn create_firewall(
        &self,
        _firewall: &FirewallConfig,
        _node_ids: &[String],
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn create_load_balancer(
        &self,
        _lb: &LoadBalancerConfig,
    ) -> Result<LoadBalancerOutput, ProviderError> {
        Err(ProviderError::Unsupported("load balancers".to_string()))
    }

    async fn cleanup(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_dry_run_deploys_whole_document() {
    let server_key = WireGuardKeyPair::generate().public_key;
    let config = load(&multi_cloud_document(&server_key));
    assert!(ConfigValidator::new().validate(&config).passed);

    let mut orchestrator = Orchestrator::new(Arc::new(config), ProviderCatalog::dry_run());
    let outputs = orchestrator.deploy().await.unwrap();

    // Disabled providers are never initialized
    assert_eq!(orchestrator.registry().names(), vec!["hetzner", "vultr"]);
    assert_eq!(outputs.node_count(), 5);
    assert_eq!(outputs.vpn_mode, VpnMode::WireGuard);
    assert_eq!(orchestrator.get_master_nodes().len(), 3);
    assert_eq!(orchestrator.get_worker_nodes().len(), 2);
    assert!(orchestrator
        .get_nodes_by_provider("vultr")
        .unwrap()
        .iter()
        .all(|n| n.region == "ewr"));
    assert_eq!(outputs.load_balancers.len(), 1);
    assert_eq!(
        outputs.api_endpoint.as_deref(),
        Some("https://api.k8s.example.com:6443")
    );

    let json: Value = serde_json::from_str(&outputs.to_json().unwrap()).unwrap();
    assert_eq!(json["metadata"]["name"], "edge");
    assert_eq!(json["vpn_mode"], "wireguard");
    assert_eq!(json["nodes"]["hetzner"].as_array().unwrap().len(), 3);
    assert!(json["dns_records"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["name"] == "api.k8s.example.com"));

    // Every mesh member gets a config peering with the hub
    let wg = orchestrator.vpn_configs().get("wk-1").unwrap();
    assert!(wg.contains("[Interface]"));
    assert!(wg.contains(&server_key));

    // First master initializes, the rest join it over the mesh
    let plan = orchestrator.bootstrap_plan();
    assert_eq!(plan.len(), 5);
    assert_eq!(plan[0].node, "cp-1");
    assert!(plan[4].install_command.contains("INSTALL_RKE2_TYPE=agent"));
}

#[tokio::test]
async fn test_custom_adapter_short_pool_fails_verification() {
    let config = load(&format!(
        r#"
metadata:
  name: lab
providers:
  bench:
    kind: short
    enabled: true
security:
  ssh:
    public_key: "{PUBLIC_KEY}"
node_pools:
  cp:
    provider: bench
    count: 3
    roles: [master]
"#
    ));

    let pool_calls = Arc::new(AtomicUsize::new(0));
    let calls = pool_calls.clone();
    let factory: ProviderFactory = Arc::new(
        move |name: &str, _config: &ProviderConfig| -> Result<Arc<dyn Provider>, ProviderError> {
            Ok(Arc::new(ShortPoolProvider {
                name: name.to_string(),
                pool_calls: calls.clone(),
            }))
        },
    );
    let catalog = ProviderCatalog::new().with_factory("short", factory);

    let mut orchestrator = Orchestrator::new(Arc::new(config), catalog);
    let err = orchestrator.deploy().await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::DistributionMismatch {
            scope: CountScope::Total,
            expected: 3,
            actual: 2,
        }
    ));
    assert_eq!(err.to_string(), "expected 3 nodes, got 2");
    assert_eq!(pool_calls.load(Ordering::SeqCst), 1);
    // Nodes that were created stay queryable after the failure
    assert_eq!(orchestrator.inventory().len(), 2);
}

#[tokio::test]
async fn test_unknown_kind_without_dry_run() {
    let config = load(
        r#"
metadata:
  name: prod
providers:
  aws:
    enabled: true
"#,
    );
    let orchestrator = Orchestrator::new(Arc::new(config), ProviderCatalog::new());

    let err = orchestrator.initialize_providers().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to initialize provider aws: unsupported provider kind 'aws'"
    );
    assert!(orchestrator.registry().is_empty());
}

#[tokio::test]
async fn test_destroy_after_initialization() {
    let server_key = WireGuardKeyPair::generate().public_key;
    let config = load(&multi_cloud_document(&server_key));
    let orchestrator = Orchestrator::new(Arc::new(config), ProviderCatalog::dry_run());

    orchestrator.initialize_providers().await.unwrap();
    orchestrator.cleanup().await.unwrap();
    assert_eq!(orchestrator.registry().len(), 2);
}

#[test]
fn test_standalone_nodes_from_blocking_caller() {
    let config = load(&format!(
        r#"
metadata:
  name: solo
providers:
  do:
    enabled: true
security:
  ssh:
    public_key: "{PUBLIC_KEY}"
nodes:
  - name: gateway
    provider: do
    roles: [worker]
    vpn_ip: 10.8.0.40
"#
    ));
    let orchestrator = Orchestrator::new(Arc::new(config), ProviderCatalog::dry_run());

    tokio_test::block_on(async {
        orchestrator.initialize_providers().await.unwrap();
        orchestrator.deploy_all().await.unwrap();
    });

    let node = orchestrator.get_node_by_name("gateway").unwrap();
    assert_eq!(node.provider, "do");
    assert_eq!(node.vpn_ip.as_deref(), Some("10.8.0.40"));
    assert_eq!(orchestrator.get_worker_nodes().len(), 1);
    assert!(orchestrator.get_master_nodes().is_empty());
}

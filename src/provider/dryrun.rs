//! In-process provider that fabricates resources without calling any cloud
//!
//! Used by `--dry-run` to exercise the whole pipeline, and by tests. Node
//! addresses are deterministic. Public addresses are handed out in order
//! from the benchmarking range 198.18.0.0/15. Private addresses come from
//! a per-provider /24 carved out of `network.cidr`: the n-th enabled
//! provider (in name order) gets the n-th /24 of the range. A /24 holds
//! 253 nodes (.2 onwards); creating more is an error, like on a real VPC
//! subnet.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use tracing::{debug, info};

use super::{LoadBalancerOutput, NetworkOutput, NodeOutput, Provider, ProviderError};
use crate::config::{
    ClusterConfig, FirewallConfig, LoadBalancerConfig, NetworkConfig, NodeConfig, NodePool,
    ProviderConfig,
};

const DEFAULT_REGION: &str = "dry-run-1";

/// First address of 198.18.0.0/15
const PUBLIC_BASE: u32 = 0xC612_0000;
const PUBLIC_SIZE: u32 = 1 << 17;

/// Usable host numbers in a provider /24 (.2 to .254)
const HOSTS_PER_SUBNET: u32 = 253;

pub struct DryRunProvider {
    name: String,
    region: String,
    /// Set by `initialize`
    private_subnet: OnceLock<Ipv4Network>,
    next_private: AtomicU32,
    next_public: AtomicU32,
    created: Mutex<Vec<String>>,
}

impl DryRunProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: DEFAULT_REGION.to_string(),
            private_subnet: OnceLock::new(),
            next_private: AtomicU32::new(0),
            next_public: AtomicU32::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(name: &str, config: &ProviderConfig) -> Self {
        let mut provider = Self::new(name);
        if let Some(region) = &config.region {
            provider.region = region.clone();
        }
        provider
    }

    /// Names of every resource created so far, in creation order
    pub fn created_resources(&self) -> Vec<String> {
        self.created
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// The /24 this provider's private addresses come from
    pub fn private_subnet(&self) -> Option<Ipv4Network> {
        self.private_subnet.get().copied()
    }

    fn record(&self, resource: String) {
        if let Ok(mut created) = self.created.lock() {
            created.push(resource);
        }
    }

    fn ensure_initialized(&self) -> Result<Ipv4Network, ProviderError> {
        self.private_subnet().ok_or(ProviderError::NotInitialized)
    }

    fn region_or_default(&self, region: &str) -> String {
        if region.is_empty() {
            self.region.clone()
        } else {
            region.to_string()
        }
    }

    fn next_addresses(
        &self,
        subnet: Ipv4Network,
    ) -> Result<(Ipv4Addr, Ipv4Addr), ProviderError> {
        let host = self.next_private.fetch_add(1, Ordering::SeqCst);
        if host >= HOSTS_PER_SUBNET {
            return Err(ProviderError::Api(format!(
                "subnet {} has no free addresses",
                subnet
            )));
        }
        let public = self.next_public.fetch_add(1, Ordering::SeqCst);
        if public >= PUBLIC_SIZE - 2 {
            return Err(ProviderError::Api("public address pool exhausted".to_string()));
        }
        Ok((
            Ipv4Addr::from(PUBLIC_BASE + 1 + public),
            Ipv4Addr::from(u32::from(subnet.network()) + 2 + host),
        ))
    }

    fn fabricate(
        &self,
        subnet: Ipv4Network,
        name: &str,
        region: &str,
        size: &str,
        roles: &[String],
        labels: &BTreeMap<String, String>,
    ) -> Result<NodeOutput, ProviderError> {
        let (public, private) = self.next_addresses(subnet)?;
        let mut node = NodeOutput::new(name, &self.name)
            .with_public_ip(public.to_string())
            .with_private_ip(private.to_string());
        node.region = self.region_or_default(region);
        node.size = if size.is_empty() {
            "small".to_string()
        } else {
            size.to_string()
        };
        node.labels.extend(labels.clone());
        if let Some(role) = roles.first() {
            node = node.with_role(role.clone());
        }
        if !roles.is_empty() {
            node.labels.insert("roles".to_string(), roles.join(","));
        }
        self.record(format!("node/{}", name));
        Ok(node)
    }
}

/// The `index`-th /24 inside `cidr`
fn provider_subnet(cidr: &str, index: usize) -> Result<Ipv4Network, ProviderError> {
    let range = Ipv4Network::from_str(cidr).map_err(|e| {
        ProviderError::InvalidConfig(format!("network cidr '{}' is not IPv4: {}", cidr, e))
    })?;
    let blocks = if range.prefix() > 24 {
        0
    } else {
        1u64 << (24 - range.prefix())
    };
    if index as u64 >= blocks {
        return Err(ProviderError::InvalidConfig(format!(
            "network cidr {} has no /24 left for provider #{}",
            cidr,
            index + 1
        )));
    }
    let base = u32::from(range.network()) + (index as u32) * 256;
    Ipv4Network::new(Ipv4Addr::from(base), 24)
        .map_err(|e| ProviderError::InvalidConfig(e.to_string()))
}

#[async_trait]
impl Provider for DryRunProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn regions(&self) -> Vec<String> {
        vec![self.region.clone()]
    }

    fn sizes(&self) -> Vec<String> {
        ["small", "medium", "large"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn initialize(&self, config: &ClusterConfig) -> Result<(), ProviderError> {
        let enabled = config.enabled_providers();
        let index = enabled
            .iter()
            .position(|(name, _)| name.as_str() == self.name)
            .unwrap_or(enabled.len());
        let subnet = provider_subnet(&config.network.cidr, index)?;
        let subnet = *self.private_subnet.get_or_init(|| subnet);
        info!(
            "Dry-run provider {} initialized for cluster {} (private {})",
            self.name, config.metadata.name, subnet
        );
        Ok(())
    }

    async fn create_node(&self, node: &NodeConfig) -> Result<NodeOutput, ProviderError> {
        let subnet = self.ensure_initialized()?;
        debug!("Dry-run provider {} creating node {}", self.name, node.name);
        let mut output = self.fabricate(
            subnet,
            &node.name,
            &node.region,
            &node.size,
            &node.roles,
            &node.labels,
        )?;
        output.vpn_ip = node.vpn_ip.clone();
        Ok(output)
    }

    async fn create_node_pool(&self, pool: &NodePool) -> Result<Vec<NodeOutput>, ProviderError> {
        let subnet = self.ensure_initialized()?;
        debug!(
            "Dry-run provider {} creating pool {} ({} nodes)",
            self.name, pool.name, pool.count
        );
        (1..=pool.count)
            .map(|i| {
                self.fabricate(
                    subnet,
                    &format!("{}-{}", pool.name, i),
                    &pool.region,
                    &pool.size,
                    &pool.roles,
                    &pool.labels,
                )
            })
            .collect()
    }

    async fn create_network(
        &self,
        network: &NetworkConfig,
    ) -> Result<NetworkOutput, ProviderError> {
        self.ensure_initialized()?;
        let id = format!("{}-network", self.name);
        self.record(format!("network/{}", id));
        Ok(NetworkOutput {
            id: id.clone(),
            name: id,
            provider: self.name.clone(),
            cidr: network.cidr.clone(),
            region: self.region.clone(),
        })
    }

    async fn create_firewall(
        &self,
        firewall: &FirewallConfig,
        node_ids: &[String],
    ) -> Result<(), ProviderError> {
        self.ensure_initialized()?;
        debug!(
            "Dry-run provider {} applying firewall {} to {} nodes",
            self.name,
            firewall.name,
            node_ids.len()
        );
        self.record(format!("firewall/{}", firewall.name));
        Ok(())
    }

    async fn create_load_balancer(
        &self,
        lb: &LoadBalancerConfig,
    ) -> Result<LoadBalancerOutput, ProviderError> {
        self.ensure_initialized()?;
        self.record(format!("load-balancer/{}", lb.name));
        Ok(LoadBalancerOutput {
            id: format!("{}-{}", self.name, lb.name),
            name: lb.name.clone(),
            provider: self.name.clone(),
            address: "203.0.113.250".to_string(),
        })
    }

    async fn cleanup(&self) -> Result<(), ProviderError> {
        let removed = self
            .created
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default();
        info!(
            "Dry-run provider {} removed {} resources",
            self.name,
            removed.len()
        );
        Ok(())
    }
}

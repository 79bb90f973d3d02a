//! Cloud provider adapter contract
//!
//! Every cloud backend implements [`Provider`]. The orchestrator only ever
//! talks to backends through this trait, looked up by name in the
//! [`ProviderRegistry`]. Actual cloud API calls live behind the trait and
//! are free to block on I/O; the orchestrator imposes no timeouts of its own.

pub mod catalog;
pub mod dryrun;
pub mod registry;

pub use catalog::{ProviderCatalog, ProviderFactory};
pub use dryrun::DryRunProvider;
pub use registry::ProviderRegistry;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::roles::ROLE_LABEL;
use crate::config::{
    ClusterConfig, FirewallConfig, LoadBalancerConfig, NetworkConfig, NodeConfig, NodePool,
};

/// Errors originating inside a provider adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{0}")]
    Api(String),

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("missing credential '{0}'")]
    MissingCredential(String),

    #[error("provider not initialized")]
    NotInitialized,

    #[error("unsupported provider kind '{0}'")]
    UnsupportedKind(String),

    #[error("{0} is not supported by this provider")]
    Unsupported(String),
}

/// A node materialized by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub vpn_ip: Option<String>,
    /// Free-form labels; `role` drives master/worker queries
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NodeOutput {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            region: String::new(),
            size: String::new(),
            public_ip: None,
            private_ip: None,
            vpn_ip: None,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.labels.insert(ROLE_LABEL.to_string(), role.into());
        self
    }

    pub fn with_public_ip(mut self, ip: impl Into<String>) -> Self {
        self.public_ip = Some(ip.into());
        self
    }

    pub fn with_private_ip(mut self, ip: impl Into<String>) -> Self {
        self.private_ip = Some(ip.into());
        self
    }

    /// Value of the `role` label, if any
    pub fn role(&self) -> Option<&str> {
        self.labels.get(ROLE_LABEL).map(String::as_str)
    }

    /// Address other nodes should use: VPN, then private, then public
    pub fn internal_address(&self) -> Option<&str> {
        self.vpn_ip
            .as_deref()
            .or(self.private_ip.as_deref())
            .or(self.public_ip.as_deref())
    }

    /// Address reachable from outside the cluster: public, then private
    pub fn external_address(&self) -> Option<&str> {
        self.public_ip.as_deref().or(self.private_ip.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkOutput {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub cidr: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerOutput {
    pub id: String,
    pub name: String,
    pub provider: String,
    /// IP or hostname clients connect to
    pub address: String,
}

/// Contract every cloud backend implements
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name the adapter is registered under
    fn name(&self) -> &str;

    fn regions(&self) -> Vec<String>;

    fn sizes(&self) -> Vec<String>;

    async fn initialize(&self, config: &ClusterConfig) -> Result<(), ProviderError>;

    async fn create_node(&self, node: &NodeConfig) -> Result<NodeOutput, ProviderError>;

    /// Create every node of a pool; the returned order is preserved by the inventory
    async fn create_node_pool(&self, pool: &NodePool) -> Result<Vec<NodeOutput>, ProviderError>;

    async fn create_network(&self, network: &NetworkConfig)
        -> Result<NetworkOutput, ProviderError>;

    /// Apply the firewall to the named nodes
    async fn create_firewall(
        &self,
        firewall: &FirewallConfig,
        node_ids: &[String],
    ) -> Result<(), ProviderError>;

    async fn create_load_balancer(
        &self,
        lb: &LoadBalancerConfig,
    ) -> Result<LoadBalancerOutput, ProviderError>;

    /// Tear down everything this adapter created
    async fn cleanup(&self) -> Result<(), ProviderError>;
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_output_role_and_addresses() {
        let node = NodeOutput::new("cp-1", "aws")
            .with_role("master")
            .with_private_ip("10.0.0.5");
        assert_eq!(node.role(), Some("master"));
        assert_eq!(node.internal_address(), Some("10.0.0.5"));
        assert_eq!(node.external_address(), Some("10.0.0.5"));

        let bare = NodeOutput::new("x", "aws");
        assert_eq!(bare.role(), None);
        assert_eq!(bare.internal_address(), None);
    }

    #[test]
    fn test_vpn_address_preferred_internally() {
        let mut node = NodeOutput::new("w", "do")
            .with_public_ip("203.0.113.9")
            .with_private_ip("10.1.0.9");
        node.vpn_ip = Some("10.8.0.9".to_string());
        assert_eq!(node.internal_address(), Some("10.8.0.9"));
        assert_eq!(node.external_address(), Some("203.0.113.9"));
    }

    #[test]
    fn test_provider_error_messages() {
        assert_eq!(
            ProviderError::Api("quota exceeded".to_string()).to_string(),
            "quota exceeded"
        );
        assert_eq!(
            ProviderError::UnsupportedKind("linode".to_string()).to_string(),
            "unsupported provider kind 'linode'"
        );
    }
}

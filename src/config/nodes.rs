use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single standalone node declared in the cluster config
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeConfig {
    pub name: String,

    /// Name of the provider entry that hosts this node
    pub provider: String,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub size: String,

    #[serde(default)]
    pub image: String,

    /// Kubernetes roles: "master", "controlplane", "etcd", "worker"
    #[serde(default)]
    pub roles: Vec<String>,

    /// Pre-assigned VPN mesh address
    #[serde(default)]
    pub vpn_ip: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            region: String::new(),
            size: String::new(),
            image: String::new(),
            roles: Vec::new(),
            vpn_ip: None,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// A named group of homogeneous nodes on one provider
///
/// `count` is the authoritative expected cardinality: the distribution
/// verifier compares it against what providers actually created. A pool
/// listing several roles contributes `count` to each of them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodePool {
    /// Filled from the map key when omitted in the document
    #[serde(default)]
    pub name: String,

    pub provider: String,

    pub count: u32,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub size: String,

    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NodePool {
    pub fn new(name: impl Into<String>, provider: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            count,
            region: String::new(),
            size: String::new(),
            image: String::new(),
            roles: Vec::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

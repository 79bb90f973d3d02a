//! RKE2 cluster bootstrap plan
//!
//! The first master initializes the cluster; every other node joins through
//! its supervisor port with the shared token. Nodes talk to each other over
//! their internal address, which is the mesh address when a VPN assigned
//! one. Masters are tainted `CriticalAddonsOnly` when dedicated workers
//! exist.

pub mod addons;

pub use addons::{plan_addons, AddonStep, IngressManager, StorageManager};

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cluster::roles::{is_master_node, ROLE_LABEL};
use crate::cluster::{OrchestratorError, RKE2_SUPERVISOR_PORT};
use crate::config::{KubernetesConfig, NetworkConfig};
use crate::provider::NodeOutput;

const INSTALL_URL: &str = "https://get.rke2.io";
const MASTER_TAINT: &str = "CriticalAddonsOnly=true:NoExecute";

/// How a node enters the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Initializes the cluster
    Init,
    Server,
    Agent,
}

impl NodeKind {
    fn install_type(&self) -> &'static str {
        match self {
            NodeKind::Init | NodeKind::Server => "server",
            NodeKind::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapStep {
    pub node: String,
    pub kind: NodeKind,
    pub install_command: String,
    pub config_yaml: String,
}

/// `/etc/rancher/rke2/config.yaml`
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct Rke2Config<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    token: &'a str,
    node_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_ip: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_external_ip: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    node_label: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    node_taint: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tls_san: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cni: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_cidr: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_cidr: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    disable: Vec<&'a str>,
}

pub struct RkeManager {
    kubernetes: KubernetesConfig,
    network: NetworkConfig,
    token: String,
    api_hostname: Option<String>,
    masters: Vec<NodeOutput>,
    agents: Vec<NodeOutput>,
}

impl std::fmt::Debug for RkeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RkeManager")
            .field("version", &self.kubernetes.version)
            .field("masters", &self.masters.len())
            .field("agents", &self.agents.len())
            .finish_non_exhaustive()
    }
}

impl RkeManager {
    /// Plan the bootstrap over the given nodes, in inventory order
    pub fn new(
        kubernetes: &KubernetesConfig,
        network: &NetworkConfig,
        nodes: Vec<NodeOutput>,
        api_hostname: Option<String>,
    ) -> Result<Self, OrchestratorError> {
        let (masters, agents): (Vec<_>, Vec<_>) = nodes.into_iter().partition(is_master_node);
        if masters.is_empty() {
            return Err(OrchestratorError::NoMasterNodes);
        }

        let token = kubernetes
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        info!(
            "RKE2 {} bootstrap planned: {} servers, {} agents, init on {}",
            kubernetes.version,
            masters.len(),
            agents.len(),
            masters[0].name
        );

        Ok(Self {
            kubernetes: kubernetes.clone(),
            network: network.clone(),
            token,
            api_hostname,
            masters,
            agents,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn init_server(&self) -> &NodeOutput {
        &self.masters[0]
    }

    /// Supervisor URL joining nodes register against
    pub fn server_url(&self) -> Result<String, OrchestratorError> {
        let init = self.init_server();
        let address = init
            .internal_address()
            .ok_or_else(|| OrchestratorError::Render {
                what: format!("server URL for {}", init.name),
                message: "init server has no address".to_string(),
            })?;
        Ok(format!("https://{}:{}", address, RKE2_SUPERVISOR_PORT))
    }

    fn tls_sans(&self) -> Vec<String> {
        let mut sans: Vec<String> = self.kubernetes.tls_sans.clone();
        sans.extend(self.api_hostname.iter().cloned());
        for master in &self.masters {
            for address in [master.public_ip.as_ref(), master.vpn_ip.as_ref()].into_iter().flatten() {
                if !sans.contains(address) {
                    sans.push(address.clone());
                }
            }
        }
        sans
    }

    fn kind_of(&self, node: &str) -> Option<(NodeKind, &NodeOutput)> {
        if let Some(pos) = self.masters.iter().position(|n| n.name == node) {
            let kind = if pos == 0 { NodeKind::Init } else { NodeKind::Server };
            return Some((kind, &self.masters[pos]));
        }
        self.agents
            .iter()
            .find(|n| n.name == node)
            .map(|n| (NodeKind::Agent, n))
    }

    /// Render `config.yaml` for one node
    pub fn render_node_config(&self, node: &str) -> Result<String, OrchestratorError> {
        let (kind, output) = self
            .kind_of(node)
            .ok_or_else(|| OrchestratorError::NodeNotFound(node.to_string()))?;
        let is_server = kind != NodeKind::Agent;

        let labels: BTreeMap<&String, &String> = output
            .labels
            .iter()
            .filter(|(k, _)| k.as_str() != ROLE_LABEL)
            .collect();

        let config = Rke2Config {
            server: (kind != NodeKind::Init).then(|| self.server_url()).transpose()?,
            token: &self.token,
            node_name: &output.name,
            node_ip: output.internal_address(),
            node_external_ip: output.public_ip.as_deref(),
            node_label: labels
                .into_iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect(),
            node_taint: if is_server && !self.agents.is_empty() {
                vec![MASTER_TAINT]
            } else {
                Vec::new()
            },
            tls_san: if is_server { self.tls_sans() } else { Vec::new() },
            cni: is_server.then_some(self.kubernetes.cni.as_str()),
            cluster_cidr: is_server.then_some(self.network.pod_cidr.as_str()),
            service_cidr: is_server.then_some(self.network.service_cidr.as_str()),
            disable: if is_server {
                self.kubernetes.disable.iter().map(String::as_str).collect()
            } else {
                Vec::new()
            },
        };

        serde_yaml::to_string(&config).map_err(|e| OrchestratorError::Render {
            what: format!("RKE2 config for {}", node),
            message: e.to_string(),
        })
    }

    fn install_command(&self, kind: NodeKind) -> String {
        format!(
            "curl -sfL {} | INSTALL_RKE2_VERSION={} INSTALL_RKE2_TYPE={} sh -",
            INSTALL_URL,
            self.kubernetes.version,
            kind.install_type()
        )
    }

    /// Ordered plan: init server, remaining servers, then agents
    pub fn plan(&self) -> Result<Vec<BootstrapStep>, OrchestratorError> {
        self.masters
            .iter()
            .chain(self.agents.iter())
            .map(|node| {
                let (kind, _) = self
                    .kind_of(&node.name)
                    .ok_or_else(|| OrchestratorError::NodeNotFound(node.name.clone()))?;
                debug!("Rendering RKE2 {:?} config for {}", kind, node.name);
                Ok(BootstrapStep {
                    node: node.name.clone(),
                    kind,
                    install_command: self.install_command(kind),
                    config_yaml: self.render_node_config(&node.name)?,
                })
            })
            .collect()
    }
}

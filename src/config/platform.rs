//! Pass-through settings for the cluster bootstrap and exposure phases

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kubernetes distribution settings (RKE2)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KubernetesConfig {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_cni")]
    pub cni: String,

    /// Join token; generated when absent
    #[serde(default)]
    pub token: Option<String>,

    /// Extra subject alternative names for the API server certificate
    #[serde(default)]
    pub tls_sans: Vec<String>,

    /// Packaged components to disable, e.g. "rke2-ingress-nginx"
    #[serde(default)]
    pub disable: Vec<String>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cni: default_cni(),
            token: None,
            tls_sans: Vec::new(),
            disable: Vec::new(),
        }
    }
}

fn default_version() -> String {
    "v1.30.4+rke2r1".to_string()
}

fn default_cni() -> String {
    "canal".to_string()
}

/// An add-on applied after the cluster is bootstrapped
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AddonConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub namespace: Option<String>,

    /// Manifest URL applied with kubectl
    #[serde(default)]
    pub manifest_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoadBalancerConfig {
    pub name: String,

    /// Provider entry that hosts the load balancer
    pub provider: String,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub ports: Vec<LoadBalancerPort>,

    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoadBalancerPort {
    pub port: u16,
    pub target_port: u16,
    #[serde(default = "default_lb_protocol")]
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthCheckConfig {
    pub port: u16,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_interval")]
    pub interval_secs: u32,
}

fn default_lb_protocol() -> String {
    "tcp".to_string()
}

fn default_interval() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub classes: Vec<StorageClassConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageClassConfig {
    pub name: String,

    pub provisioner: String,

    #[serde(default)]
    pub default: bool,

    #[serde(default = "default_reclaim_policy")]
    pub reclaim_policy: String,

    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

fn default_reclaim_policy() -> String {
    "Delete".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IngressConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_ingress_class")]
    pub class: String,

    #[serde(default = "default_ingress_namespace")]
    pub namespace: String,

    /// Hostnames routed through the ingress controller
    #[serde(default)]
    pub hostnames: Vec<String>,

    #[serde(default)]
    pub tls: bool,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            class: default_ingress_class(),
            namespace: default_ingress_namespace(),
            hostnames: Vec::new(),
            tls: false,
        }
    }
}

fn default_ingress_class() -> String {
    "nginx".to_string()
}

fn default_ingress_namespace() -> String {
    "ingress-nginx".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

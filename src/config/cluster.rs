use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::network::NetworkConfig;
use super::nodes::{NodeConfig, NodePool};
use super::platform::{
    AddonConfig, IngressConfig, KubernetesConfig, LoadBalancerConfig, MonitoringConfig,
    StorageConfig,
};
use super::security::SecurityConfig;

/// Errors that can occur while parsing a cluster document
#[derive(Error, Debug, PartialEq)]
pub enum ClusterConfigError {
    #[error("JSON parse error: {0}")]
    JsonError(String),

    #[error("YAML parse error: {0}")]
    YamlError(String),

    #[error("Unresolved variable in '{field}': {message}")]
    UnresolvedVariable { field: String, message: String },
}

/// Serialization format of a cluster document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON with optional `//` and `/* */` comments
    Json,
    Yaml,
}

/// The full desired-state document
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterConfig {
    pub metadata: Metadata,

    /// Provider entries keyed by provider name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    /// Standalone nodes, deployed in order before any pool
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    #[serde(default)]
    pub node_pools: BTreeMap<String, NodePool>,

    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    #[serde(default)]
    pub addons: Vec<AddonConfig>,

    #[serde(default)]
    pub load_balancer: Option<LoadBalancerConfig>,

    #[serde(default)]
    pub storage: Option<StorageConfig>,

    #[serde(default)]
    pub ingress: Option<IngressConfig>,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Metadata {
    pub name: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// One cloud account / backend
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Backend kind ("aws", "digitalocean", ...); defaults to the entry name
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub region: Option<String>,

    /// Opaque credentials handed to the adapter, `${VAR}` expanded on load
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Backend kind for an entry registered under `name`
    pub fn kind_or<'a>(&'a self, name: &'a str) -> &'a str {
        self.kind.as_deref().unwrap_or(name)
    }
}

// ============================================================================
// SBIO: Pure parsing functions (no I/O)
// ============================================================================

/// Strip C-style comments from JSONC content, leaving string literals intact.
pub fn strip_jsonc_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            result.push(c);
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            result.push(c);
            continue;
        }

        if !in_string && c == '/' {
            if chars.peek() == Some(&'/') {
                chars.next();
                for nc in chars.by_ref() {
                    if nc == '\n' {
                        result.push('\n');
                        break;
                    }
                }
                continue;
            } else if chars.peek() == Some(&'*') {
                chars.next();
                let mut prev = ' ';
                for nc in chars.by_ref() {
                    if prev == '*' && nc == '/' {
                        break;
                    }
                    prev = nc;
                }
                continue;
            }
        }

        result.push(c);
    }

    result
}

/// Parse a cluster document and normalize it.
pub fn parse_cluster_config(
    content: &str,
    format: ConfigFormat,
) -> Result<ClusterConfig, ClusterConfigError> {
    let mut config: ClusterConfig = match format {
        ConfigFormat::Json => serde_json::from_str(&strip_jsonc_comments(content))
            .map_err(|e| ClusterConfigError::JsonError(e.to_string()))?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| ClusterConfigError::YamlError(e.to_string()))?,
    };
    config.normalize();
    Ok(config)
}

fn expand_field(field: &str, value: &str) -> Result<String, ClusterConfigError> {
    shellexpand::env(value)
        .map(|v| v.into_owned())
        .map_err(|e| ClusterConfigError::UnresolvedVariable {
            field: field.to_string(),
            message: e.to_string(),
        })
}

impl ClusterConfig {
    /// Parse a document without touching the environment.
    pub fn from_str(content: &str, format: ConfigFormat) -> Result<Self, ClusterConfigError> {
        parse_cluster_config(content, format)
    }

    /// Minimal document with only metadata set
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            metadata: Metadata {
                name: name.into(),
                environment: default_environment(),
                version: default_version(),
                description: None,
            },
            providers: BTreeMap::new(),
            network: NetworkConfig::default(),
            security: SecurityConfig::default(),
            nodes: Vec::new(),
            node_pools: BTreeMap::new(),
            kubernetes: KubernetesConfig::default(),
            addons: Vec::new(),
            load_balancer: None,
            storage: None,
            ingress: None,
            monitoring: MonitoringConfig::default(),
        }
    }

    /// Pool names default to their map key.
    pub fn normalize(&mut self) {
        for (key, pool) in self.node_pools.iter_mut() {
            if pool.name.is_empty() {
                pool.name = key.clone();
            }
        }
    }

    /// Expand `${VAR}` references in secret-bearing fields from the environment.
    pub fn expand_env(&mut self) -> Result<(), ClusterConfigError> {
        for (name, provider) in self.providers.iter_mut() {
            for (key, value) in provider.credentials.iter_mut() {
                *value = expand_field(&format!("providers.{}.credentials.{}", name, key), value)?;
            }
        }

        if let Some(ts) = self.network.tailscale.as_mut() {
            if let Some(key) = ts.auth_key.as_mut() {
                *key = expand_field("network.tailscale.auth_key", key)?;
            }
        }

        if let Some(token) = self.kubernetes.token.as_mut() {
            *token = expand_field("kubernetes.token", token)?;
        }

        Ok(())
    }

    /// Provider entries flagged enabled, in name order
    pub fn enabled_providers(&self) -> Vec<(&String, &ProviderConfig)> {
        self.providers.iter().filter(|(_, p)| p.enabled).collect()
    }

    /// Number of nodes the document declares (standalone + pool counts)
    pub fn declared_node_count(&self) -> u64 {
        self.nodes.len() as u64
            + self
                .node_pools
                .values()
                .map(|p| u64::from(p.count))
                .sum::<u64>()
    }
}

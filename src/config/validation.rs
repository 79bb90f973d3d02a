//! Structural validation of cluster documents
//!
//! The validator never fails: it collects every problem it can find into a
//! [`ValidationResult`] so the CLI can print a complete report. Errors block
//! a deployment, warnings and infos are advisory.

use std::collections::{BTreeMap, HashSet};

use ipnetwork::IpNetwork;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::cluster::ClusterConfig;
use crate::cluster::roles;

/// RFC 1123 label, the shape Kubernetes node names must have
const DNS_LABEL: &str = r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$";

/// Validation result with severity levels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ValidationSeverity {
    /// Informational hint
    Info,
    /// Warning - may work but suboptimal
    Warning,
    /// Error - deployment will fail
    Error,
}

/// A single validation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub severity: ValidationSeverity,
    pub code: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Validation result containing all messages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub messages: Vec<ValidationMessage>,
    pub passed: bool,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            passed: true,
        }
    }

    pub fn add(&mut self, msg: ValidationMessage) {
        if msg.severity == ValidationSeverity::Error {
            self.passed = false;
        }
        self.messages.push(msg);
    }

    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        code: &str,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) {
        self.add(ValidationMessage {
            severity,
            code: code.to_string(),
            message: message.into(),
            suggestion: suggestion.map(String::from),
        });
    }

    pub fn info(mut self, code: &str, message: &str) -> Self {
        self.push(ValidationSeverity::Info, code, message, None);
        self
    }

    pub fn warning(mut self, code: &str, message: &str, suggestion: Option<&str>) -> Self {
        self.push(ValidationSeverity::Warning, code, message, suggestion);
        self
    }

    pub fn error(mut self, code: &str, message: &str, suggestion: Option<&str>) -> Self {
        self.push(ValidationSeverity::Error, code, message, suggestion);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.severity == ValidationSeverity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.severity == ValidationSeverity::Warning)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.messages.iter().any(|m| m.code == code)
    }

    /// Error messages joined into one line
    pub fn error_summary(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.severity == ValidationSeverity::Error)
            .map(|m| m.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Check a name against the RFC 1123 label shape
pub fn is_dns_label(name: &str) -> bool {
    Regex::new(DNS_LABEL)
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

/// Stateless validator, always available on the orchestrator
#[derive(Debug, Clone, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, config: &ClusterConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        self.check_names(config, &mut result);
        self.check_providers(config, &mut result);
        self.check_networks(config, &mut result);
        self.check_roles(config, &mut result);

        let vpn = &config.network;
        let ts_enabled = vpn.tailscale.as_ref().is_some_and(|t| t.enabled);
        let wg_enabled = vpn.wireguard.as_ref().is_some_and(|w| w.enabled);
        if ts_enabled && wg_enabled {
            result.push(
                ValidationSeverity::Info,
                "VPN_PRECEDENCE",
                "Both Tailscale and WireGuard are enabled; Tailscale will be used",
                Some("Disable one of them to make the choice explicit"),
            );
        }

        result
    }

    fn check_names(&self, config: &ClusterConfig, result: &mut ValidationResult) {
        if !is_dns_label(&config.metadata.name) {
            result.push(
                ValidationSeverity::Error,
                "INVALID_NAME",
                format!("Cluster name '{}' is not a valid DNS label", config.metadata.name),
                Some("Use lowercase letters, digits and '-'"),
            );
        }

        let mut seen = HashSet::new();
        for node in &config.nodes {
            if !seen.insert(node.name.as_str()) {
                result.push(
                    ValidationSeverity::Error,
                    "DUPLICATE_NODE",
                    format!("Duplicate node name: '{}'", node.name),
                    None,
                );
            }
            if !is_dns_label(&node.name) {
                result.push(
                    ValidationSeverity::Error,
                    "INVALID_NAME",
                    format!("Node name '{}' is not a valid DNS label", node.name),
                    Some("Use lowercase letters, digits and '-'"),
                );
            }
        }

        for (key, pool) in &config.node_pools {
            if !is_dns_label(&pool.name) {
                result.push(
                    ValidationSeverity::Error,
                    "INVALID_NAME",
                    format!("Node pool name '{}' is not a valid DNS label", pool.name),
                    None,
                );
            }
            if pool.count == 0 {
                result.push(
                    ValidationSeverity::Info,
                    "EMPTY_POOL",
                    format!("Node pool '{}' has count 0 and creates no nodes", key),
                    None,
                );
            }
        }
    }

    fn check_providers(&self, config: &ClusterConfig, result: &mut ValidationResult) {
        let enabled = config.enabled_providers();
        if enabled.is_empty() {
            result.push(
                ValidationSeverity::Error,
                "NO_PROVIDERS",
                "No cloud providers enabled",
                Some("Set enabled: true on at least one provider"),
            );
        }

        let mut kinds: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, provider) in &enabled {
            let kind = provider.kind_or(name);
            if let Some(previous) = kinds.insert(kind, name.as_str()) {
                result.push(
                    ValidationSeverity::Error,
                    "DUPLICATE_PROVIDER_KIND",
                    format!(
                        "Providers '{}' and '{}' both enable kind '{}'",
                        previous, name, kind
                    ),
                    Some("Only one enabled entry per provider kind is supported"),
                );
            }
        }

        let references = config
            .nodes
            .iter()
            .map(|n| ("node", n.name.as_str(), n.provider.as_str()))
            .chain(
                config
                    .node_pools
                    .values()
                    .map(|p| ("node pool", p.name.as_str(), p.provider.as_str())),
            )
            .chain(
                config
                    .load_balancer
                    .iter()
                    .map(|lb| ("load balancer", lb.name.as_str(), lb.provider.as_str())),
            );

        for (what, name, provider) in references {
            match config.providers.get(provider) {
                None => result.push(
                    ValidationSeverity::Error,
                    "UNKNOWN_PROVIDER",
                    format!("Provider '{}' referenced by {} '{}' is not defined", provider, what, name),
                    None,
                ),
                Some(p) if !p.enabled => result.push(
                    ValidationSeverity::Error,
                    "DISABLED_PROVIDER",
                    format!("Provider '{}' referenced by {} '{}' is disabled", provider, what, name),
                    Some("Enable the provider or move the entity elsewhere"),
                ),
                Some(_) => {}
            }
        }
    }

    fn check_networks(&self, config: &ClusterConfig, result: &mut ValidationResult) {
        let net = &config.network;
        let mut parsed = BTreeMap::new();
        for (field, value) in [
            ("network.cidr", &net.cidr),
            ("network.pod_cidr", &net.pod_cidr),
            ("network.service_cidr", &net.service_cidr),
        ] {
            match value.parse::<IpNetwork>() {
                Ok(n) => {
                    parsed.insert(field, n);
                }
                Err(e) => result.push(
                    ValidationSeverity::Error,
                    "INVALID_CIDR",
                    format!("{} '{}' is not a valid CIDR: {}", field, value, e),
                    None,
                ),
            }
        }

        if let (Some(pods), Some(services)) = (
            parsed.get("network.pod_cidr"),
            parsed.get("network.service_cidr"),
        ) {
            if networks_overlap(pods, services) {
                result.push(
                    ValidationSeverity::Error,
                    "OVERLAPPING_CIDR",
                    format!("Pod CIDR {} overlaps service CIDR {}", pods, services),
                    None,
                );
            }
        }

        if let Some(fw) = &config.security.firewall {
            for cidr in &fw.allowed_ssh_cidrs {
                if cidr.parse::<IpNetwork>().is_err() {
                    result.push(
                        ValidationSeverity::Error,
                        "INVALID_CIDR",
                        format!("Allowed SSH source '{}' is not a valid CIDR", cidr),
                        None,
                    );
                }
            }
        }
    }

    fn check_roles(&self, config: &ClusterConfig, result: &mut ValidationResult) {
        for pool in config.node_pools.values() {
            if pool.roles.is_empty() {
                result.push(
                    ValidationSeverity::Warning,
                    "POOL_WITHOUT_ROLES",
                    format!("Node pool '{}' declares no roles", pool.name),
                    Some("Add master, controlplane, etcd or worker"),
                );
            }
        }

        let has_control_plane = config
            .nodes
            .iter()
            .map(|n| &n.roles)
            .chain(config.node_pools.values().map(|p| &p.roles))
            .any(|r| roles::declares_master(r));
        if !has_control_plane {
            result.push(
                ValidationSeverity::Warning,
                "NO_CONTROL_PLANE",
                "No node or pool declares a master/controlplane role",
                None,
            );
        }

        // Distribution verification counts pools only.
        if !config.nodes.is_empty() && !config.node_pools.is_empty() {
            result.push(
                ValidationSeverity::Warning,
                "STANDALONE_NODES_UNCOUNTED",
                format!(
                    "{} standalone node(s) are not part of any pool count; distribution verification will report a total mismatch",
                    config.nodes.len()
                ),
                Some("Move standalone nodes into a node pool"),
            );
        }
    }
}

fn networks_overlap(a: &IpNetwork, b: &IpNetwork) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

/// Format a validation report for display
pub fn format_validation_result(result: &ValidationResult) -> String {
    let mut output = String::new();

    for msg in &result.messages {
        let prefix = match msg.severity {
            ValidationSeverity::Info => "INFO",
            ValidationSeverity::Warning => "WARN",
            ValidationSeverity::Error => "ERROR",
        };

        output.push_str(&format!("  {} [{}]: {}\n", prefix, msg.code, msg.message));

        if let Some(suggestion) = &msg.suggestion {
            output.push_str(&format!("    -> {}\n", suggestion));
        }
    }

    output.push_str(if result.passed {
        "Validation: PASSED\n"
    } else {
        "Validation: FAILED\n"
    });

    output
}

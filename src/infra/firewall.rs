//! Cluster firewall: mandatory rules plus user rules, applied per provider
//!
//! Each provider receives the same rule set together with the names of the
//! nodes it owns. Providers without nodes are skipped.

use std::collections::BTreeMap;

use ipnetwork::IpNetwork;
use tracing::{debug, info};

use crate::cluster::{
    NodeInventory, OrchestratorError, KUBELET_PORT, KUBE_API_PORT, RKE2_SUPERVISOR_PORT,
    TAILSCALE_PORT, VXLAN_PORT,
};
use crate::config::{FirewallConfig, FirewallRule, NetworkConfig, SecurityConfig};
use crate::provider::ProviderRegistry;
use crate::vpn::VpnMode;

const ANYWHERE: &str = "0.0.0.0/0";

/// Check one rule; the error string is the failure detail
pub fn validate_rule(rule: &FirewallRule) -> Result<(), String> {
    match rule.protocol.as_str() {
        "icmp" => {
            if !rule.port.is_empty() {
                return Err(format!("rule {}: icmp rules take no port", rule.name));
            }
        }
        "tcp" | "udp" => parse_port_range(&rule.port)
            .ok_or_else(|| format!("rule {}: invalid port '{}'", rule.name, rule.port))
            .map(|_| ())?,
        other => {
            return Err(format!("rule {}: unknown protocol '{}'", rule.name, other));
        }
    }

    if let Some(bad) = rule.sources.iter().find(|s| s.parse::<IpNetwork>().is_err()) {
        return Err(format!("rule {}: invalid source CIDR '{}'", rule.name, bad));
    }
    Ok(())
}

/// "22" or "30000-32767", inclusive, non-zero
fn parse_port_range(port: &str) -> Option<(u16, u16)> {
    let (low, high) = match port.split_once('-') {
        Some((low, high)) => (low.trim().parse().ok()?, high.trim().parse().ok()?),
        None => {
            let p: u16 = port.trim().parse().ok()?;
            (p, p)
        }
    };
    (low > 0 && low <= high).then_some((low, high))
}

/// Mandatory rules for an RKE2 cluster on the given overlay
pub fn baseline_rules(
    firewall: &FirewallConfig,
    network: &NetworkConfig,
    vpn_mode: VpnMode,
) -> Vec<FirewallRule> {
    let anywhere = vec![ANYWHERE.to_string()];
    let mut internal = vec![network.cidr.clone()];
    if vpn_mode == VpnMode::WireGuard {
        if let Some(wg) = &network.wireguard {
            internal.push(wg.subnet.clone());
        }
    }
    let ssh_sources = if firewall.allowed_ssh_cidrs.is_empty() {
        anywhere.clone()
    } else {
        firewall.allowed_ssh_cidrs.clone()
    };

    let mut rules = vec![
        FirewallRule::new("ssh", "tcp", "22", ssh_sources),
        FirewallRule::new("kube-api", "tcp", KUBE_API_PORT.to_string(), anywhere.clone()),
        FirewallRule::new(
            "rke2-supervisor",
            "tcp",
            RKE2_SUPERVISOR_PORT.to_string(),
            internal.clone(),
        ),
        FirewallRule::new("kubelet", "tcp", KUBELET_PORT.to_string(), internal.clone()),
        FirewallRule::new("cni-vxlan", "udp", VXLAN_PORT.to_string(), internal),
    ];

    match vpn_mode {
        VpnMode::WireGuard => {
            let port = network
                .wireguard
                .as_ref()
                .map(|wg| wg.listen_port)
                .unwrap_or_else(crate::config::network::default_wireguard_port);
            rules.push(FirewallRule::new("wireguard", "udp", port.to_string(), anywhere));
        }
        VpnMode::Tailscale => {
            rules.push(FirewallRule::new(
                "tailscale",
                "udp",
                TAILSCALE_PORT.to_string(),
                anywhere,
            ));
        }
        VpnMode::None => {}
    }
    rules
}

#[derive(Debug)]
pub struct FirewallManager {
    config: FirewallConfig,
    /// provider -> node names the firewall was applied to
    applied: BTreeMap<String, Vec<String>>,
}

impl FirewallManager {
    /// Merge mandatory and user rules and validate the result
    pub fn new(
        security: &SecurityConfig,
        network: &NetworkConfig,
        vpn_mode: VpnMode,
    ) -> Result<Self, OrchestratorError> {
        let user = security.firewall.clone().unwrap_or_default();
        let mut rules = baseline_rules(&user, network, vpn_mode);
        for rule in user.rules.iter().cloned() {
            rules.retain(|r| r.name != rule.name);
            rules.push(rule);
        }

        for rule in &rules {
            validate_rule(rule).map_err(|details| OrchestratorError::validation("Firewall", details))?;
        }

        Ok(Self {
            config: FirewallConfig { rules, ..user },
            applied: BTreeMap::new(),
        })
    }

    pub fn rules(&self) -> &[FirewallRule] {
        &self.config.rules
    }

    /// Apply to every registered provider that owns nodes
    pub async fn apply(
        &mut self,
        registry: &ProviderRegistry,
        inventory: &NodeInventory,
    ) -> Result<(), OrchestratorError> {
        let nodes = inventory.snapshot();
        for (name, provider) in registry.get_all() {
            let node_ids: Vec<String> = nodes
                .get(&name)
                .map(|slot| slot.iter().map(|n| n.name.clone()).collect())
                .unwrap_or_default();
            if node_ids.is_empty() {
                debug!("No nodes on {}, skipping firewall", name);
                continue;
            }

            provider
                .create_firewall(&self.config, &node_ids)
                .await
                .map_err(|source| OrchestratorError::Firewall {
                    name: name.clone(),
                    source,
                })?;
            info!(
                "Firewall {} applied to {} nodes on {}",
                self.config.name,
                node_ids.len(),
                name
            );
            self.applied.insert(name, node_ids);
        }
        Ok(())
    }

    pub fn applied(&self) -> &BTreeMap<String, Vec<String>> {
        &self.applied
    }
}

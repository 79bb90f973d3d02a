//! Reachability checks for deployed nodes
//!
//! Every node in the inventory is probed with a plain TCP connect against
//! its SSH port, and masters additionally against the Kubernetes API port.
//! Probes run concurrently and each one is bounded by the configured
//! timeout. Results are informational; nothing in the deployment pipeline
//! depends on them.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::inventory::NodeInventory;
use super::roles::is_master_node;
use super::KUBE_API_PORT;
use crate::config::security::default_ssh_port;

/// Configuration for the health checker
#[derive(Debug, Clone)]
pub struct HealthCheckerConfig {
    /// Timeout for each connect attempt
    pub timeout_secs: u64,
    pub ssh_port: u16,
    pub api_port: u16,
}

impl Default for HealthCheckerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            ssh_port: default_ssh_port(),
            api_port: KUBE_API_PORT,
        }
    }
}

/// Result of a single TCP probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthProbeResult {
    pub node: String,
    pub address: Option<String>,
    pub port: u16,
    pub success: bool,
    /// Connect time in milliseconds
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn probe_port(node: &str, address: Option<&str>, port: u16, limit: Duration) -> HealthProbeResult {
    let start = Instant::now();
    let timestamp = Utc::now();

    let Some(address) = address else {
        return HealthProbeResult {
            node: node.to_string(),
            address: None,
            port,
            success: false,
            latency_ms: 0,
            timestamp,
            error: Some("no address".to_string()),
        };
    };

    let result = timeout(limit, TcpStream::connect((address, port))).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (success, latency_ms, error) = match result {
        Ok(Ok(_)) => (true, latency_ms, None),
        Ok(Err(e)) => (false, latency_ms, Some(e.to_string())),
        Err(_) => (false, limit.as_millis() as u64, Some("Timeout".to_string())),
    };

    HealthProbeResult {
        node: node.to_string(),
        address: Some(address.to_string()),
        port,
        success,
        latency_ms,
        timestamp,
        error,
    }
}

/// Probes deployed nodes over TCP
#[derive(Debug, Clone, Default)]
pub struct HealthChecker {
    config: HealthCheckerConfig,
}

impl HealthChecker {
    pub fn new(config: HealthCheckerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HealthCheckerConfig {
        &self.config
    }

    /// Probe every node in the inventory
    pub async fn check(&self, inventory: &NodeInventory) -> ClusterHealth {
        let nodes = inventory.all_nodes();
        let limit = Duration::from_secs(self.config.timeout_secs);

        let mut targets: Vec<(String, Option<String>, u16)> = Vec::new();
        for node in &nodes {
            let address = node.external_address().map(str::to_string);
            targets.push((node.name.clone(), address.clone(), self.config.ssh_port));
            if is_master_node(node) {
                targets.push((node.name.clone(), address, self.config.api_port));
            }
        }

        if targets.is_empty() {
            trace!("No nodes to probe");
            return ClusterHealth::default();
        }

        debug!("Probing {} node ports", targets.len());

        let probes = targets
            .iter()
            .map(|(node, address, port)| probe_port(node, address.as_deref(), *port, limit));
        let probes = futures::future::join_all(probes).await;

        for failed in probes.iter().filter(|p| !p.success) {
            warn!(
                "Node {} port {} unreachable: {}",
                failed.node,
                failed.port,
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }

        ClusterHealth::from_probes(nodes.len() as u32, probes)
    }
}

/// Summary of node reachability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub total_nodes: u32,
    /// Nodes whose every probe succeeded
    pub reachable_nodes: u32,
    pub probes: Vec<HealthProbeResult>,
}

impl ClusterHealth {
    fn from_probes(total_nodes: u32, probes: Vec<HealthProbeResult>) -> Self {
        let mut failed: Vec<&str> = probes
            .iter()
            .filter(|p| !p.success)
            .map(|p| p.node.as_str())
            .collect();
        failed.sort_unstable();
        failed.dedup();

        Self {
            total_nodes,
            reachable_nodes: total_nodes.saturating_sub(failed.len() as u32),
            probes,
        }
    }

    /// Overall status
    pub fn status(&self) -> &'static str {
        if self.total_nodes == 0 {
            "Empty"
        } else if self.reachable_nodes == self.total_nodes {
            "Healthy"
        } else if self.reachable_nodes == 0 {
            "Unreachable"
        } else {
            "Degraded"
        }
    }

    /// Plain text table, one line per probe
    pub fn format_table(&self) -> String {
        use std::fmt::Write;

        let mut output = String::new();
        let _ = writeln!(
            output,
            "Status: {}  Nodes: {}  Reachable: {}",
            self.status(),
            self.total_nodes,
            self.reachable_nodes
        );
        if self.probes.is_empty() {
            let _ = writeln!(output, "No nodes deployed");
            return output;
        }

        let _ = writeln!(
            output,
            "{:<24} {:<16} {:>5}  {:<6} {:>8}",
            "NODE", "ADDRESS", "PORT", "STATUS", "LATENCY"
        );
        for probe in &self.probes {
            let _ = writeln!(
                output,
                "{:<24} {:<16} {:>5}  {:<6} {:>6}ms",
                truncate(&probe.node, 24),
                probe.address.as_deref().unwrap_or("-"),
                probe.port,
                if probe.success { "up" } else { "down" },
                probe.latency_ms
            );
        }
        output
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{}…", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::NodeOutput;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello w…");
    }

    #[test]
    fn test_status() {
        let health = ClusterHealth::default();
        assert_eq!(health.status(), "Empty");

        let probe = |node: &str, success: bool| HealthProbeResult {
            node: node.to_string(),
            address: Some("127.0.0.1".to_string()),
            port: 22,
            success,
            latency_ms: 1,
            timestamp: Utc::now(),
            error: None,
        };
        let health = ClusterHealth::from_probes(
            2,
            vec![probe("a", true), probe("b", false), probe("b", false)],
        );
        assert_eq!(health.reachable_nodes, 1);
        assert_eq!(health.status(), "Degraded");
        assert!(health.format_table().contains("down"));
    }

    #[tokio::test]
    async fn test_empty_inventory() {
        let health = HealthChecker::default().check(&NodeInventory::new()).await;
        assert_eq!(health.total_nodes, 0);
        assert!(health.format_table().contains("No nodes deployed"));
    }

    #[tokio::test]
    async fn test_probes_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let inventory = NodeInventory::new();
        inventory.append(
            "local",
            vec![
                NodeOutput::new("up", "local")
                    .with_role("worker")
                    .with_public_ip("127.0.0.1"),
                NodeOutput::new("nowhere", "local").with_role("worker"),
            ],
        );

        let checker = HealthChecker::new(HealthCheckerConfig {
            timeout_secs: 2,
            ssh_port: port,
            api_port: port,
        });
        let health = checker.check(&inventory).await;

        assert_eq!(health.total_nodes, 2);
        assert_eq!(health.reachable_nodes, 1);
        let up = health.probes.iter().find(|p| p.node == "up").unwrap();
        assert!(up.success);
        let nowhere = health.probes.iter().find(|p| p.node == "nowhere").unwrap();
        assert_eq!(nowhere.error.as_deref(), Some("no address"));
    }
}

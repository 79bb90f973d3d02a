//! What a run produced, in a form other tools can consume

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::bootstrap::AddonStep;
use crate::config::Metadata;
use crate::infra::DnsRecord;
use crate::provider::{LoadBalancerOutput, NetworkOutput, NodeOutput};
use crate::vpn::VpnMode;

/// Exported state of the cluster after a run
#[derive(Debug, Clone, Serialize)]
pub struct ClusterOutputs {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub metadata: Metadata,
    /// Nodes per provider, each list in deployment order
    pub nodes: BTreeMap<String, Vec<NodeOutput>>,
    pub vpn_mode: VpnMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, NetworkOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_records: Vec<DnsRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load_balancers: Vec<LoadBalancerOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addons: Vec<AddonStep>,
}

impl ClusterOutputs {
    pub fn node_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let outputs = ClusterOutputs {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            metadata: Metadata {
                name: "edge".to_string(),
                environment: "staging".to_string(),
                version: "1.2.0".to_string(),
                description: None,
            },
            nodes: BTreeMap::from([(
                "aws".to_string(),
                vec![NodeOutput::new("cp-1", "aws").with_role("master")],
            )]),
            vpn_mode: VpnMode::WireGuard,
            api_endpoint: Some("https://api.example.com:6443".to_string()),
            ssh_fingerprint: None,
            networks: BTreeMap::new(),
            dns_records: Vec::new(),
            load_balancers: Vec::new(),
            addons: Vec::new(),
        };

        let value: serde_json::Value = serde_json::from_str(&outputs.to_json().unwrap()).unwrap();
        assert_eq!(value["vpn_mode"], "wireguard");
        assert_eq!(value["metadata"]["environment"], "staging");
        assert_eq!(value["nodes"]["aws"][0]["name"], "cp-1");
        assert_eq!(value["api_endpoint"], "https://api.example.com:6443");
        assert!(value.get("ssh_fingerprint").is_none());
        assert!(value.get("dns_records").is_none());
        assert_eq!(outputs.node_count(), 1);
    }
}

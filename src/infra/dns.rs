//! DNS record set for the cluster domain
//!
//! Records are derived from the inventory and rebuilt wholesale whenever the
//! node set changes: one `A` record per node, a round-robin API record over
//! the masters and, optionally, a wildcard over the workers for ingress.

use serde::Serialize;
use tracing::debug;

use crate::cluster::roles::{is_master_node, is_worker_node};
use crate::cluster::{NodeInventory, OrchestratorError, KUBE_API_PORT};
use crate::config::validation::is_dns_label;
use crate::config::DnsConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    pub ttl: u32,
}

impl DnsRecord {
    fn a(name: String, value: &str, ttl: u32) -> Self {
        Self {
            name,
            record_type: "A".to_string(),
            value: value.to_string(),
            ttl,
        }
    }
}

#[derive(Debug)]
pub struct DnsManager {
    config: DnsConfig,
    records: Vec<DnsRecord>,
}

impl DnsManager {
    /// Build a manager after checking the configured domain
    pub fn new(config: DnsConfig) -> Result<Self, OrchestratorError> {
        if let Some(domain) = &config.domain {
            let domain = domain.trim_end_matches('.');
            if domain.is_empty() || !domain.split('.').all(is_dns_label) {
                return Err(OrchestratorError::validation(
                    "DNS",
                    format!("invalid domain '{}'", domain),
                ));
            }
        }
        if !is_dns_label(&config.api_subdomain) {
            return Err(OrchestratorError::validation(
                "DNS",
                format!("invalid API subdomain '{}'", config.api_subdomain),
            ));
        }
        Ok(Self {
            config,
            records: Vec::new(),
        })
    }

    fn domain(&self) -> Option<&str> {
        self.config.domain.as_deref().map(|d| d.trim_end_matches('.'))
    }

    /// API server hostname, when a domain is configured
    pub fn api_hostname(&self) -> Option<String> {
        self.domain()
            .map(|d| format!("{}.{}", self.config.api_subdomain, d))
    }

    pub fn api_endpoint(&self) -> Option<String> {
        self.api_hostname()
            .map(|host| format!("https://{}:{}", host, KUBE_API_PORT))
    }

    /// Replace the record set with one derived from the current inventory
    pub fn rebuild(&mut self, inventory: &NodeInventory) {
        let Some(domain) = self.domain().map(str::to_string) else {
            self.records.clear();
            return;
        };
        let ttl = self.config.ttl;
        let nodes = inventory.all_nodes();

        let mut records: Vec<DnsRecord> = nodes
            .iter()
            .filter_map(|n| {
                n.external_address()
                    .map(|ip| DnsRecord::a(format!("{}.{}", n.name, domain), ip, ttl))
            })
            .collect();

        let api = format!("{}.{}", self.config.api_subdomain, domain);
        records.extend(
            nodes
                .iter()
                .filter(|n| is_master_node(n))
                .filter_map(|n| n.external_address())
                .map(|ip| DnsRecord::a(api.clone(), ip, ttl)),
        );

        if self.config.ingress_wildcard {
            let wildcard = format!("*.{}", domain);
            records.extend(
                nodes
                    .iter()
                    .filter(|n| is_worker_node(n))
                    .filter_map(|n| n.external_address())
                    .map(|ip| DnsRecord::a(wildcard.clone(), ip, ttl)),
            );
        }

        debug!("DNS record set rebuilt with {} records", records.len());
        self.records = records;
    }

    pub fn records(&self) -> &[DnsRecord] {
        &self.records
    }
}

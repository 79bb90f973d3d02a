//! Provider-facing infrastructure phases: base networks, DNS records and
//! firewalls. Each manager is created lazily by the orchestrator the first
//! time its phase runs.

pub mod dns;
pub mod firewall;
pub mod network;

pub use dns::{DnsManager, DnsRecord};
pub use firewall::{baseline_rules, validate_rule, FirewallManager};
pub use network::NetworkManager;

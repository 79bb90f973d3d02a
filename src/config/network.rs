use serde::{Deserialize, Serialize};

/// Base networking plus the overlay mesh and DNS settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// VPC / private network range requested from every provider
    #[serde(default = "default_cidr")]
    pub cidr: String,

    #[serde(default = "default_pod_cidr")]
    pub pod_cidr: String,

    #[serde(default = "default_service_cidr")]
    pub service_cidr: String,

    #[serde(default)]
    pub wireguard: Option<WireGuardConfig>,

    #[serde(default)]
    pub tailscale: Option<TailscaleConfig>,

    #[serde(default)]
    pub dns: DnsConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: default_cidr(),
            pod_cidr: default_pod_cidr(),
            service_cidr: default_service_cidr(),
            wireguard: None,
            tailscale: None,
            dns: DnsConfig::default(),
        }
    }
}

fn default_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_pod_cidr() -> String {
    "10.42.0.0/16".to_string()
}

fn default_service_cidr() -> String {
    "10.43.0.0/16".to_string()
}

/// WireGuard hub-and-mesh settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WireGuardConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Hub endpoint, "host:port"
    #[serde(default)]
    pub server_endpoint: Option<String>,

    /// Hub public key, base64
    #[serde(default)]
    pub server_public_key: Option<String>,

    /// Mesh address range; the first host address belongs to the hub
    #[serde(default = "default_wireguard_subnet")]
    pub subnet: String,

    #[serde(default = "default_wireguard_port")]
    pub listen_port: u16,

    #[serde(default = "default_keepalive")]
    pub persistent_keepalive: u16,

    #[serde(default)]
    pub mtu: Option<u16>,

    /// Machines outside the cluster that every node peers with directly
    #[serde(default)]
    pub peers: Vec<WireGuardPeer>,
}

/// Static WireGuard peer, e.g. an office gateway or a bastion
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WireGuardPeer {
    pub name: String,

    /// Base64 public key, as printed by `wg pubkey`
    pub public_key: String,

    #[serde(default)]
    pub endpoint: Option<String>,

    /// Ranges routed to this peer
    pub allowed_ips: Vec<String>,
}

impl Default for WireGuardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_endpoint: None,
            server_public_key: None,
            subnet: default_wireguard_subnet(),
            listen_port: default_wireguard_port(),
            persistent_keepalive: default_keepalive(),
            mtu: None,
            peers: Vec::new(),
        }
    }
}

fn default_wireguard_subnet() -> String {
    "10.8.0.0/24".to_string()
}

pub(crate) fn default_wireguard_port() -> u16 {
    51820
}

fn default_keepalive() -> u16 {
    25
}

/// Tailscale (or self-hosted Headscale) settings
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TailscaleConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub auth_key: Option<String>,

    /// Coordination server URL (`--login-server`)
    #[serde(default)]
    pub control_url: Option<String>,

    /// ACL tags advertised by every node, e.g. "tag:k8s"
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub accept_routes: bool,
}

/// DNS zone used to publish node and API records
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub domain: Option<String>,

    /// Provider hosting the zone, informational for now
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default = "default_ttl")]
    pub ttl: u32,

    #[serde(default = "default_api_subdomain")]
    pub api_subdomain: String,

    /// Publish `*.<domain>` pointing at worker nodes
    #[serde(default = "default_true")]
    pub ingress_wildcard: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            domain: None,
            provider: None,
            ttl: default_ttl(),
            api_subdomain: default_api_subdomain(),
            ingress_wildcard: true,
        }
    }
}

fn default_ttl() -> u32 {
    300
}

fn default_api_subdomain() -> String {
    "api".to_string()
}

fn default_true() -> bool {
    true
}

//! WireGuard hub-and-mesh configuration
//!
//! The first host address of the mesh subnet belongs to the hub described
//! by `server_endpoint`/`server_public_key`. Every node gets its own key
//! pair and the next free address; addresses a provider already reported
//! in `vpn_ip` are honored when they fall inside the subnet.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::net::Ipv4Addr;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ipnetwork::{IpNetwork, Ipv4Network};
use tracing::debug;

use super::VpnError;
use crate::config::WireGuardConfig;
use crate::provider::NodeOutput;

/// Curve25519 key pair, both halves base64 encoded the way `wg` prints them
#[derive(Clone)]
pub struct WireGuardKeyPair {
    pub private_key: String,
    pub public_key: String,
}

impl WireGuardKeyPair {
    pub fn generate() -> Self {
        let private = x25519_dalek::StaticSecret::random_from_rng(rand::thread_rng());
        let public = x25519_dalek::PublicKey::from(&private);
        Self {
            private_key: STANDARD.encode(private.as_bytes()),
            public_key: STANDARD.encode(public.as_bytes()),
        }
    }
}

impl std::fmt::Debug for WireGuardKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireGuardKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Check WireGuard settings; the error string is the failure detail
pub fn validate_wireguard(config: &WireGuardConfig) -> Result<(), String> {
    let endpoint = config
        .server_endpoint
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or("server endpoint is required")?;
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| format!("server endpoint '{}' must be host:port", endpoint))?;
    if host.is_empty() || port.parse::<u16>().map_or(true, |p| p == 0) {
        return Err(format!("server endpoint '{}' must be host:port", endpoint));
    }

    let key = config
        .server_public_key
        .as_deref()
        .ok_or("server public key is required")?;
    if !is_public_key(key) {
        return Err("server public key must be a base64 encoded 32-byte key".to_string());
    }

    let subnet = Ipv4Network::from_str(&config.subnet)
        .map_err(|e| format!("invalid subnet '{}': {}", config.subnet, e))?;
    if subnet.prefix() > 30 {
        return Err(format!(
            "subnet {} is too small for a hub and peers",
            config.subnet
        ));
    }

    if config.listen_port == 0 {
        return Err("listen port must be non-zero".to_string());
    }

    let mut seen = HashSet::new();
    for peer in &config.peers {
        if peer.name.trim().is_empty() {
            return Err("peer name is required".to_string());
        }
        if !seen.insert(peer.name.as_str()) {
            return Err(format!("duplicate peer '{}'", peer.name));
        }
        if !is_public_key(&peer.public_key) {
            return Err(format!(
                "peer '{}' public key must be a base64 encoded 32-byte key",
                peer.name
            ));
        }
        if peer.allowed_ips.is_empty() {
            return Err(format!("peer '{}' has no allowed IPs", peer.name));
        }
        if let Some(bad) = peer
            .allowed_ips
            .iter()
            .find(|ip| ip.parse::<IpNetwork>().is_err())
        {
            return Err(format!("peer '{}' allowed IP '{}' is not a CIDR", peer.name, bad));
        }
    }

    Ok(())
}

fn is_public_key(key: &str) -> bool {
    STANDARD
        .decode(key.trim())
        .is_ok_and(|bytes| bytes.len() == 32)
}

#[derive(Debug, Clone)]
struct MeshPeer {
    name: String,
    address: Ipv4Addr,
    keys: WireGuardKeyPair,
    endpoint: Option<String>,
}

/// Mesh membership and per-node wg-quick rendering
#[derive(Debug, Clone)]
pub struct WireGuardMesh {
    config: WireGuardConfig,
    subnet: Ipv4Network,
    peers: Vec<MeshPeer>,
}

impl WireGuardMesh {
    pub fn new(config: WireGuardConfig) -> Result<Self, VpnError> {
        let subnet =
            Ipv4Network::from_str(&config.subnet).map_err(|e| VpnError::InvalidSubnet {
                subnet: config.subnet.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            config,
            subnet,
            peers: Vec::new(),
        })
    }

    /// Address reserved for the hub
    pub fn hub_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.subnet.network()) + 1)
    }

    pub fn address_of(&self, node: &str) -> Option<Ipv4Addr> {
        self.peer(node).map(|p| p.address)
    }

    pub fn public_key_of(&self, node: &str) -> Option<&str> {
        self.peer(node).map(|p| p.keys.public_key.as_str())
    }

    pub fn node_names(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.name.clone()).collect()
    }

    fn peer(&self, node: &str) -> Option<&MeshPeer> {
        self.peers.iter().find(|p| p.name == node)
    }

    fn is_taken(&self, address: Ipv4Addr) -> bool {
        address == self.hub_address() || self.peers.iter().any(|p| p.address == address)
    }

    fn next_free(&self) -> Result<Ipv4Addr, VpnError> {
        let first = u32::from(self.subnet.network()) + 2;
        let last = u32::from(self.subnet.broadcast());
        (first..last)
            .map(Ipv4Addr::from)
            .find(|a| !self.is_taken(*a))
            .ok_or_else(|| VpnError::AddressPoolExhausted(self.subnet.to_string()))
    }

    fn preassigned(&self, node: &NodeOutput, address: &str) -> Result<Ipv4Addr, VpnError> {
        let invalid = |reason: &str| VpnError::InvalidAddress {
            node: node.name.clone(),
            address: address.to_string(),
            reason: reason.to_string(),
        };
        let ip = Ipv4Addr::from_str(address).map_err(|_| invalid("not an IPv4 address"))?;
        if !self.subnet.contains(ip)
            || ip == self.subnet.network()
            || ip == self.subnet.broadcast()
        {
            return Err(invalid(&format!("outside mesh subnet {}", self.subnet)));
        }
        if self.is_taken(ip) {
            return Err(invalid("already assigned"));
        }
        Ok(ip)
    }

    /// Enroll nodes in order; nodes already in the mesh are skipped
    pub fn add_nodes(&mut self, nodes: &[NodeOutput]) -> Result<(), VpnError> {
        for node in nodes {
            if self.peer(&node.name).is_some() {
                continue;
            }
            let address = match &node.vpn_ip {
                Some(ip) => self.preassigned(node, ip)?,
                None => self.next_free()?,
            };
            debug!("WireGuard peer {} -> {}", node.name, address);
            self.peers.push(MeshPeer {
                name: node.name.clone(),
                address,
                keys: WireGuardKeyPair::generate(),
                endpoint: node
                    .external_address()
                    .map(|ip| format!("{}:{}", ip, self.config.listen_port)),
            });
        }
        Ok(())
    }

    /// wg-quick configuration for one node: the hub, every other node, then the static peers
    pub fn render_config(&self, node: &str) -> Result<String, VpnError> {
        let me = self
            .peer(node)
            .ok_or_else(|| VpnError::UnknownPeer(node.to_string()))?;

        let mut out = String::new();
        let _ = writeln!(out, "[Interface]");
        let _ = writeln!(out, "PrivateKey = {}", me.keys.private_key);
        let _ = writeln!(out, "Address = {}/{}", me.address, self.subnet.prefix());
        let _ = writeln!(out, "ListenPort = {}", self.config.listen_port);
        if let Some(mtu) = self.config.mtu {
            let _ = writeln!(out, "MTU = {}", mtu);
        }

        let _ = writeln!(out, "\n[Peer]");
        let _ = writeln!(
            out,
            "PublicKey = {}",
            self.config.server_public_key.as_deref().unwrap_or_default()
        );
        if let Some(endpoint) = &self.config.server_endpoint {
            let _ = writeln!(out, "Endpoint = {}", endpoint);
        }
        let _ = writeln!(out, "AllowedIPs = {}/32", self.hub_address());
        let _ = writeln!(
            out,
            "PersistentKeepalive = {}",
            self.config.persistent_keepalive
        );

        for peer in self.peers.iter().filter(|p| p.name != me.name) {
            let _ = writeln!(out, "\n# {}", peer.name);
            let _ = writeln!(out, "[Peer]");
            let _ = writeln!(out, "PublicKey = {}", peer.keys.public_key);
            if let Some(endpoint) = &peer.endpoint {
                let _ = writeln!(out, "Endpoint = {}", endpoint);
            }
            let _ = writeln!(out, "AllowedIPs = {}/32", peer.address);
            let _ = writeln!(
                out,
                "PersistentKeepalive = {}",
                self.config.persistent_keepalive
            );
        }

        for peer in &self.config.peers {
            let _ = writeln!(out, "\n# {}", peer.name);
            let _ = writeln!(out, "[Peer]");
            let _ = writeln!(out, "PublicKey = {}", peer.public_key.trim());
            if let Some(endpoint) = &peer.endpoint {
                let _ = writeln!(out, "Endpoint = {}", endpoint);
            }
            let _ = writeln!(out, "AllowedIPs = {}", peer.allowed_ips.join(", "));
        }

        Ok(out)
    }
}

//! Private mesh selection
//!
//! Exactly one overlay is configured per run. Tailscale takes strict
//! precedence: when it is present and enabled, WireGuard is not even
//! looked at. The selected mode's settings must validate before any
//! node-side configuration happens, and a validation failure is reported
//! against that mode; there is no fallback to the other mode or to none.

pub mod tailscale;
pub mod wireguard;

pub use tailscale::{validate_tailscale, TailscaleMesh};
pub use wireguard::{validate_wireguard, WireGuardKeyPair, WireGuardMesh};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::NetworkConfig;
use crate::provider::NodeOutput;

#[derive(Error, Debug, PartialEq)]
pub enum VpnError {
    #[error("{mode} validation failed: {details}")]
    Validation { mode: VpnMode, details: String },

    #[error("invalid mesh subnet '{subnet}': {reason}")]
    InvalidSubnet { subnet: String, reason: String },

    #[error("mesh address pool {0} exhausted")]
    AddressPoolExhausted(String),

    #[error("address {address} for node {node} is invalid: {reason}")]
    InvalidAddress {
        node: String,
        address: String,
        reason: String,
    },

    #[error("node {0} is not part of the mesh")]
    UnknownPeer(String),
}

/// Overlay network technology selected for the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VpnMode {
    Tailscale,
    WireGuard,
    #[default]
    None,
}

impl VpnMode {
    /// Lowercase identifier used in outputs
    pub fn as_str(&self) -> &'static str {
        match self {
            VpnMode::Tailscale => "tailscale",
            VpnMode::WireGuard => "wireguard",
            VpnMode::None => "none",
        }
    }
}

impl fmt::Display for VpnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VpnMode::Tailscale => write!(f, "Tailscale"),
            VpnMode::WireGuard => write!(f, "WireGuard"),
            VpnMode::None => write!(f, "none"),
        }
    }
}

/// Pick the overlay: enabled Tailscale, else enabled WireGuard, else none
pub fn select_vpn_mode(network: &NetworkConfig) -> VpnMode {
    if network.tailscale.as_ref().is_some_and(|t| t.enabled) {
        VpnMode::Tailscale
    } else if network.wireguard.as_ref().is_some_and(|w| w.enabled) {
        VpnMode::WireGuard
    } else {
        VpnMode::None
    }
}

/// Node-side configuration for the selected overlay
#[derive(Debug, Clone)]
pub enum VpnManager {
    Tailscale(TailscaleMesh),
    WireGuard(WireGuardMesh),
}

impl VpnManager {
    pub fn mode(&self) -> VpnMode {
        match self {
            VpnManager::Tailscale(_) => VpnMode::Tailscale,
            VpnManager::WireGuard(_) => VpnMode::WireGuard,
        }
    }

    /// Enroll nodes into the mesh; already enrolled nodes are left untouched
    pub fn add_nodes(&mut self, nodes: &[NodeOutput]) -> Result<(), VpnError> {
        match self {
            VpnManager::Tailscale(mesh) => {
                mesh.add_nodes(nodes);
                Ok(())
            }
            VpnManager::WireGuard(mesh) => mesh.add_nodes(nodes),
        }
    }

    /// Mesh address known for a node, if the overlay assigns one up front
    pub fn address_of(&self, node: &str) -> Option<String> {
        match self {
            VpnManager::Tailscale(_) => None,
            VpnManager::WireGuard(mesh) => mesh.address_of(node).map(|a| a.to_string()),
        }
    }

    /// Rendered node-side configuration: a wg-quick file or a `tailscale up` line
    pub fn render_node(&self, node: &str) -> Result<String, VpnError> {
        match self {
            VpnManager::Tailscale(mesh) => mesh.up_command(node),
            VpnManager::WireGuard(mesh) => mesh.render_config(node),
        }
    }

    pub fn node_names(&self) -> Vec<String> {
        match self {
            VpnManager::Tailscale(mesh) => mesh.node_names(),
            VpnManager::WireGuard(mesh) => mesh.node_names(),
        }
    }
}

/// Select the overlay and validate its settings.
///
/// Returns `None` for the manager when no overlay is enabled.
pub fn prepare_vpn(network: &NetworkConfig) -> Result<(VpnMode, Option<VpnManager>), VpnError> {
    let mode = select_vpn_mode(network);
    let manager = match (mode, &network.tailscale, &network.wireguard) {
        (VpnMode::Tailscale, Some(ts), _) => {
            validate_tailscale(ts).map_err(|details| VpnError::Validation { mode, details })?;
            Some(VpnManager::Tailscale(TailscaleMesh::new(ts.clone())))
        }
        (VpnMode::WireGuard, _, Some(wg)) => {
            validate_wireguard(wg).map_err(|details| VpnError::Validation { mode, details })?;
            Some(VpnManager::WireGuard(WireGuardMesh::new(wg.clone())?))
        }
        _ => {
            info!("No VPN configured, nodes will communicate over provider networks");
            None
        }
    };
    Ok((mode, manager))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TailscaleConfig, WireGuardConfig};

    fn tailscale(enabled: bool) -> TailscaleConfig {
        TailscaleConfig {
            enabled,
            auth_key: Some("tskey-auth-123".to_string()),
            control_url: Some("https://headscale.example.com".to_string()),
            ..Default::default()
        }
    }

    fn wireguard(enabled: bool) -> WireGuardConfig {
        WireGuardConfig {
            enabled,
            server_endpoint: Some("vpn.example.com:51820".to_string()),
            server_public_key: Some(WireGuardKeyPair::generate().public_key),
            ..Default::default()
        }
    }

    #[test]
    fn test_selection_precedence() {
        let mut network = NetworkConfig::default();
        assert_eq!(select_vpn_mode(&network), VpnMode::None);

        network.wireguard = Some(wireguard(true));
        assert_eq!(select_vpn_mode(&network), VpnMode::WireGuard);

        network.tailscale = Some(tailscale(false));
        assert_eq!(select_vpn_mode(&network), VpnMode::WireGuard);

        network.tailscale = Some(tailscale(true));
        assert_eq!(select_vpn_mode(&network), VpnMode::Tailscale);
    }

    #[test]
    fn test_none_is_not_an_error() {
        let mut network = NetworkConfig::default();
        network.wireguard = Some(wireguard(false));
        let (mode, manager) = prepare_vpn(&network).unwrap();
        assert_eq!(mode, VpnMode::None);
        assert!(manager.is_none());
    }

    #[test]
    fn test_tailscale_error_never_mentions_wireguard() {
        let mut network = NetworkConfig::default();
        network.tailscale = Some(TailscaleConfig {
            enabled: true,
            ..Default::default()
        });
        // WireGuard is enabled and itself invalid; it must not be consulted.
        network.wireguard = Some(WireGuardConfig {
            enabled: true,
            ..Default::default()
        });

        let err = prepare_vpn(&network).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Tailscale validation failed"));
        assert!(!message.contains("WireGuard"));
    }

    #[test]
    fn test_invalid_wireguard_does_not_fall_back() {
        let mut network = NetworkConfig::default();
        let mut wg = wireguard(true);
        wg.server_endpoint = None;
        network.wireguard = Some(wg);

        let err = prepare_vpn(&network).unwrap_err();
        assert!(matches!(
            err,
            VpnError::Validation {
                mode: VpnMode::WireGuard,
                ..
            }
        ));
        assert!(err.to_string().starts_with("WireGuard validation failed: "));
    }

    #[test]
    fn test_valid_modes_build_managers() {
        let mut network = NetworkConfig::default();
        network.wireguard = Some(wireguard(true));
        let (mode, manager) = prepare_vpn(&network).unwrap();
        assert_eq!(mode, VpnMode::WireGuard);
        assert_eq!(manager.unwrap().mode(), VpnMode::WireGuard);

        network.tailscale = Some(tailscale(true));
        let (mode, manager) = prepare_vpn(&network).unwrap();
        assert_eq!(mode, VpnMode::Tailscale);
        assert_eq!(manager.unwrap().mode(), VpnMode::Tailscale);
    }

    #[test]
    fn test_mode_identifiers() {
        assert_eq!(VpnMode::WireGuard.as_str(), "wireguard");
        assert_eq!(VpnMode::Tailscale.as_str(), "tailscale");
        assert_eq!(VpnMode::None.as_str(), "none");
        assert_eq!(
            serde_json::to_string(&VpnMode::WireGuard).unwrap(),
            "\"wireguard\""
        );
    }
}

//! Tailscale / Headscale enrollment
//!
//! Addresses are handed out by the coordination server, so all this side
//! does is validate the settings and render the `tailscale up` invocation
//! each node runs.

use tracing::debug;

use super::VpnError;
use crate::config::TailscaleConfig;
use crate::provider::NodeOutput;

/// Check Tailscale settings; the error string is the failure detail
pub fn validate_tailscale(config: &TailscaleConfig) -> Result<(), String> {
    if config.auth_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        return Err("auth key is required".to_string());
    }

    if let Some(url) = &config.control_url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(format!("control URL '{}' must be http(s)", url));
        }
    }

    if let Some(tag) = config.tags.iter().find(|t| !t.starts_with("tag:")) {
        return Err(format!("tag '{}' must start with 'tag:'", tag));
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct TailscaleMesh {
    config: TailscaleConfig,
    nodes: Vec<String>,
}

impl TailscaleMesh {
    pub fn new(config: TailscaleConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
        }
    }

    pub fn add_nodes(&mut self, nodes: &[NodeOutput]) {
        for node in nodes {
            if !self.nodes.contains(&node.name) {
                debug!("Tailscale enrollment queued for {}", node.name);
                self.nodes.push(node.name.clone());
            }
        }
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.clone()
    }

    /// `tailscale up` command line for one enrolled node
    pub fn up_command(&self, node: &str) -> Result<String, VpnError> {
        if !self.nodes.iter().any(|n| n == node) {
            return Err(VpnError::UnknownPeer(node.to_string()));
        }

        let mut args = vec![
            "tailscale up".to_string(),
            format!(
                "--authkey={}",
                self.config.auth_key.as_deref().unwrap_or_default()
            ),
            format!("--hostname={}", node),
        ];
        if let Some(url) = &self.config.control_url {
            args.push(format!("--login-server={}", url));
        }
        if !self.config.tags.is_empty() {
            args.push(format!("--advertise-tags={}", self.config.tags.join(",")));
        }
        if self.config.accept_routes {
            args.push("--accept-routes".to_string());
        }
        Ok(args.join(" "))
    }
}

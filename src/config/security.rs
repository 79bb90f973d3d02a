use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub firewall: Option<FirewallConfig>,
}

/// SSH access used to reach nodes after creation
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Inline OpenSSH public key; takes precedence over `public_key_path`
    #[serde(default)]
    pub public_key: Option<String>,

    #[serde(default)]
    pub public_key_path: Option<String>,

    #[serde(default)]
    pub private_key_path: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            port: default_ssh_port(),
            public_key: None,
            public_key_path: None,
            private_key_path: None,
        }
    }
}

fn default_ssh_user() -> String {
    "root".to_string()
}

pub(crate) fn default_ssh_port() -> u16 {
    22
}

/// Firewall applied by every provider to its own nodes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FirewallConfig {
    #[serde(default = "default_firewall_name")]
    pub name: String,

    /// Sources allowed to reach SSH; empty means anywhere
    #[serde(default)]
    pub allowed_ssh_cidrs: Vec<String>,

    #[serde(default)]
    pub rules: Vec<FirewallRule>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            name: default_firewall_name(),
            allowed_ssh_cidrs: Vec::new(),
            rules: Vec::new(),
        }
    }
}

fn default_firewall_name() -> String {
    "cluster".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FirewallRule {
    pub name: String,

    /// "tcp", "udp" or "icmp"
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Single port ("6443") or inclusive range ("30000-32767"); empty for icmp
    #[serde(default)]
    pub port: String,

    /// Source CIDRs
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl FirewallRule {
    pub fn new(
        name: impl Into<String>,
        protocol: impl Into<String>,
        port: impl Into<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            port: port.into(),
            sources,
            description: None,
        }
    }
}

fn default_protocol() -> String {
    "tcp".to_string()
}

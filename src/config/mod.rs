pub mod cluster;
pub mod network;
pub mod nodes;
pub mod platform;
pub mod security;
pub mod validation;

pub use cluster::{
    parse_cluster_config, strip_jsonc_comments, ClusterConfig, ClusterConfigError, ConfigFormat,
    Metadata, ProviderConfig,
};
pub use network::{DnsConfig, NetworkConfig, TailscaleConfig, WireGuardConfig, WireGuardPeer};
pub use nodes::{NodeConfig, NodePool};
pub use platform::{
    AddonConfig, HealthCheckConfig, IngressConfig, KubernetesConfig, LoadBalancerConfig,
    LoadBalancerPort, MonitoringConfig, StorageClassConfig, StorageConfig,
};
pub use security::{FirewallConfig, FirewallRule, SecurityConfig, SshConfig};
pub use validation::{
    format_validation_result, ConfigValidator, ValidationMessage, ValidationResult,
    ValidationSeverity,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors for file I/O operations (separate from pure parsing errors)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cluster config error: {0}")]
    ClusterConfigError(#[from] ClusterConfigError),
}

/// Default cluster document location: ~/.kubemesh/cluster.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kubemesh")
        .join("cluster.yaml")
}

/// Pick the document format from the file extension (YAML unless .json/.jsonc)
pub fn format_for_path(path: &Path) -> ConfigFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") | Some("jsonc") => ConfigFormat::Json,
        _ => ConfigFormat::Yaml,
    }
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load, parse and environment-expand a cluster document from disk.
pub fn load_cluster_config(path: &Path) -> Result<ClusterConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_cluster_config(&content, format_for_path(path))?;
    config.expand_env()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn create_temp_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_file() {
        let file = create_temp_file(
            ".yaml",
            "metadata:\n  name: lab\nproviders:\n  hetzner:\n    enabled: true\n",
        );
        let config = load_cluster_config(file.path()).unwrap();
        assert_eq!(config.metadata.name, "lab");
        assert!(config.providers["hetzner"].enabled);
    }

    #[test]
    fn test_load_jsonc_file() {
        let file = create_temp_file(
            ".jsonc",
            r#"{
                // comment
                "metadata": {"name": "lab"}
            }"#,
        );
        let config = load_cluster_config(file.path()).unwrap();
        assert_eq!(config.metadata.name, "lab");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_cluster_config(Path::new("/nonexistent/cluster.yaml"));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_format_for_path() {
        assert_eq!(format_for_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(format_for_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(format_for_path(Path::new("cluster")), ConfigFormat::Yaml);
    }
}

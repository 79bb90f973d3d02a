use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kubemesh")]
#[command(about = "Provision a Kubernetes cluster across multiple cloud providers")]
#[command(version)]
pub struct Args {
    /// Path to the cluster document (YAML, JSON or JSONC); defaults to ~/.kubemesh/cluster.yaml
    pub config_file: Option<PathBuf>,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Run the whole pipeline against in-process dry-run providers
    #[arg(long)]
    pub dry_run: bool,

    /// Path to a .env file for provider credentials
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Write the cluster outputs (JSON) to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Only validate the document and print the plan
    #[arg(long)]
    pub validate_only: bool,

    /// Initialize providers and tear down everything they created
    #[arg(long, conflicts_with = "validate_only")]
    pub destroy: bool,

    /// Probe node reachability after a successful run
    #[arg(long)]
    pub health_check: bool,
}

impl Args {
    pub fn config_path(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(crate::config::default_config_path)
    }
}

// ============================================================================
// SBIO: Pure display logic (no I/O - returns formatted strings)
// ============================================================================

use crate::cluster::Distribution;
use crate::config::ClusterConfig;
use crate::vpn::select_vpn_mode;

/// Summary of what a run would create.
/// Pure function - returns a formatted string.
pub fn format_plan(config: &ClusterConfig, args: &Args) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "kubemesh v{} - {}\n\n",
        env!("CARGO_PKG_VERSION"),
        if args.dry_run { "Dry Run" } else { "Plan" }
    ));
    output.push_str(&format!(
        "Cluster: {} ({}, v{})\n",
        config.metadata.name, config.metadata.environment, config.metadata.version
    ));
    output.push_str(&format!("Document: {}\n\n", args.config_path().display()));

    output.push_str(&format!("Providers ({}):\n", config.providers.len()));
    for (name, provider) in &config.providers {
        output.push_str(&format!(
            "  - {} [{}]{}\n",
            name,
            provider.kind_or(name),
            if provider.enabled { "" } else { " (disabled)" }
        ));
    }
    output.push('\n');

    if !config.nodes.is_empty() {
        output.push_str(&format!("Nodes ({}):\n", config.nodes.len()));
        for node in &config.nodes {
            output.push_str(&format!(
                "  - {} on {} roles: {}\n",
                node.name,
                node.provider,
                node.roles.join(",")
            ));
        }
        output.push('\n');
    }

    output.push_str(&format!("Node Pools ({}):\n", config.node_pools.len()));
    for (name, pool) in &config.node_pools {
        output.push_str(&format!(
            "  - {} x{} on {} roles: {}\n",
            name,
            pool.count,
            pool.provider,
            pool.roles.join(",")
        ));
    }

    let expected = Distribution::expected(config.node_pools.values());
    output.push_str(&format!(
        "\nExpected: {} nodes, {} masters, {} workers\n",
        expected.total, expected.masters, expected.workers
    ));
    output.push_str(&format!(
        "VPN: {}\n",
        select_vpn_mode(&config.network).as_str()
    ));
    output.push_str(&format!("Kubernetes: RKE2 {}\n", config.kubernetes.version));
    if let Some(domain) = &config.network.dns.domain {
        output.push_str(&format!("Domain: {}\n", domain));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodePool, ProviderConfig, WireGuardConfig};

    fn create_test_args() -> Args {
        Args {
            config_file: Some(PathBuf::from("cluster.yaml")),
            verbose: 0,
            dry_run: true,
            env_file: None,
            output: None,
            validate_only: false,
            destroy: false,
            health_check: false,
        }
    }

    #[test]
    fn test_format_plan() {
        let mut config = ClusterConfig::named("edge");
        config
            .providers
            .insert("aws".to_string(), ProviderConfig::enabled());
        config
            .providers
            .insert("do".to_string(), ProviderConfig::default());
        config.node_pools.insert(
            "cp".to_string(),
            NodePool::new("cp", "aws", 3).with_roles(["master", "worker"]),
        );
        config.network.wireguard = Some(WireGuardConfig {
            enabled: true,
            ..Default::default()
        });

        let output = format_plan(&config, &create_test_args());
        assert!(output.contains("Dry Run"));
        assert!(output.contains("Cluster: edge (production, v1.0.0)"));
        assert!(output.contains("  - aws [aws]\n"));
        assert!(output.contains("  - do [do] (disabled)"));
        assert!(output.contains("cp x3 on aws roles: master,worker"));
        assert!(output.contains("Expected: 3 nodes, 3 masters, 3 workers"));
        assert!(output.contains("VPN: wireguard"));
    }

    #[test]
    fn test_clap_parsing() {
        let args = Args::parse_from(["kubemesh", "cluster.yaml"]);
        assert_eq!(args.config_path(), PathBuf::from("cluster.yaml"));
        assert!(!args.dry_run);
        assert!(!args.destroy);
    }

    #[test]
    fn test_default_config_path() {
        let args = Args::parse_from(["kubemesh"]);
        assert!(args.config_path().ends_with(".kubemesh/cluster.yaml"));
    }

    #[test]
    fn test_clap_flags() {
        let args = Args::parse_from([
            "kubemesh",
            "-vv",
            "--dry-run",
            "--output",
            "out.json",
            "--env-file",
            ".env",
            "cluster.yaml",
        ]);
        assert_eq!(args.verbose, 2);
        assert!(args.dry_run);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(args.env_file, Some(PathBuf::from(".env")));
    }

    #[test]
    fn test_destroy_conflicts_with_validate_only() {
        let result = Args::try_parse_from(["kubemesh", "--destroy", "--validate-only", "c.yaml"]);
        assert!(result.is_err());
    }
}

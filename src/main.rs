use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kubemesh::cli::{format_plan, Args};
use kubemesh::cluster::{HealthChecker, HealthCheckerConfig, Orchestrator};
use kubemesh::config::{
    format_validation_result, load_cluster_config, ConfigValidator, ValidationSeverity,
};
use kubemesh::provider::ProviderCatalog;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    // Load .env file if specified
    if let Some(ref env_file) = args.env_file {
        dotenvy::from_path(env_file)
            .with_context(|| format!("Failed to load env file {}", env_file.display()))?;
    }

    let path = args.config_path();
    let config = load_cluster_config(&path)
        .with_context(|| format!("Failed to load cluster document {}", path.display()))?;

    let validation = ConfigValidator::new().validate(&config);

    if args.validate_only {
        println!("{}", format_plan(&config, &args));
        println!("{}", format_validation_result(&validation));
        if validation.has_errors() {
            bail!("{}", validation.error_summary());
        }
        return Ok(());
    }

    if validation.has_errors() {
        bail!("{}", validation.error_summary());
    }
    for msg in validation
        .messages
        .iter()
        .filter(|m| m.severity == ValidationSeverity::Warning)
    {
        warn!("[{}] {}", msg.code, msg.message);
    }

    let catalog = if args.dry_run {
        info!("Dry run: using in-process providers");
        ProviderCatalog::dry_run()
    } else {
        ProviderCatalog::new()
    };
    let health_checker = HealthChecker::new(HealthCheckerConfig {
        ssh_port: config.security.ssh.port,
        ..Default::default()
    });
    let mut orchestrator =
        Orchestrator::new(Arc::new(config), catalog).with_health_checker(health_checker);

    if args.destroy {
        orchestrator.initialize_providers().await?;
        orchestrator.cleanup().await?;
        info!("Cluster {} destroyed", orchestrator.config().metadata.name);
        return Ok(());
    }

    let outputs = orchestrator.deploy().await?;
    let json = outputs
        .to_json()
        .context("Failed to serialize cluster outputs")?;

    match args.output {
        Some(ref output) => {
            std::fs::write(output, json)
                .with_context(|| format!("Failed to write outputs to {}", output.display()))?;
            info!("Outputs written to {}", output.display());
        }
        None => println!("{}", json),
    }

    if args.health_check {
        let health = orchestrator.check_health().await;
        eprintln!("{}", health.format_table());
        if health.status() != "Healthy" {
            warn!(
                "{} of {} nodes reachable",
                health.reachable_nodes, health.total_nodes
            );
        }
    }

    Ok(())
}

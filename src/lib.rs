//! kubemesh - provision one Kubernetes cluster across several cloud
//! providers, joined by a private WireGuard or Tailscale mesh.
//!
//! The entry point is [`cluster::Orchestrator`]; cloud backends plug in
//! through [`provider::Provider`] and [`provider::ProviderCatalog`].

pub mod bootstrap;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod infra;
pub mod provider;
pub mod ssh;
pub mod vpn;

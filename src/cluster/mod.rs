//! # kubemesh cluster orchestration
//!
//! Provisions one Kubernetes cluster across several cloud providers at once.
//! The [`Orchestrator`] runs a fixed pipeline of phases:
//!
//! ```text
//! ssh keys -> providers -> networks -> vpn selection -> dns
//!          -> nodes & pools -> distribution check -> vpn mesh -> firewalls
//!          -> rke2 bootstrap -> addons -> load balancers / storage / ingress
//!          -> outputs
//! ```
//!
//! Provider adapters are looked up by name in the [`ProviderRegistry`]
//! and every node they create lands in the [`NodeInventory`], grouped by
//! provider. Role queries and the distribution check only look at each
//! node's `role` label.
//!
//! [`ProviderRegistry`]: crate::provider::ProviderRegistry

pub mod error;
pub mod health_checker;
pub mod inventory;
pub mod orchestrator;
pub mod outputs;
pub mod roles;
pub mod verify;

pub use error::{CountScope, DeployTarget, OrchestratorError};
pub use health_checker::{ClusterHealth, HealthChecker, HealthCheckerConfig, HealthProbeResult};
pub use inventory::NodeInventory;
pub use orchestrator::Orchestrator;
pub use outputs::ClusterOutputs;
pub use verify::{verify_node_distribution, Distribution};

/// Kubernetes API server port
pub const KUBE_API_PORT: u16 = 6443;

/// RKE2 supervisor port joining nodes register against
pub const RKE2_SUPERVISOR_PORT: u16 = 9345;

pub const KUBELET_PORT: u16 = 10250;

/// Canal/Flannel VXLAN
pub const VXLAN_PORT: u16 = 8472;

pub const TAILSCALE_PORT: u16 = 41641;

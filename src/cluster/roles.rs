//! Role predicates shared by inventory queries and the distribution verifier
//!
//! Roles stay free-form strings so new ones pass through untouched; only the
//! values below carry meaning for the orchestrator.

use crate::provider::NodeOutput;

/// Label key carrying a node's role
pub const ROLE_LABEL: &str = "role";

pub const ROLE_MASTER: &str = "master";
pub const ROLE_CONTROLPLANE: &str = "controlplane";
pub const ROLE_ETCD: &str = "etcd";
pub const ROLE_WORKER: &str = "worker";

/// `master` and `controlplane` both denote the control plane
pub fn is_master_role(role: &str) -> bool {
    role == ROLE_MASTER || role == ROLE_CONTROLPLANE
}

pub fn is_worker_role(role: &str) -> bool {
    role == ROLE_WORKER
}

pub fn is_master_node(node: &NodeOutput) -> bool {
    node.role().is_some_and(is_master_role)
}

pub fn is_worker_node(node: &NodeOutput) -> bool {
    node.role().is_some_and(is_worker_role)
}

/// Whether a declared role list includes a control-plane role
pub fn declares_master(roles: &[String]) -> bool {
    roles.iter().any(|r| is_master_role(r))
}

pub fn declares_worker(roles: &[String]) -> bool {
    roles.iter().any(|r| is_worker_role(r))
}

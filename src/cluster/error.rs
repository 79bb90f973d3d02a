use std::fmt;

use thiserror::Error;

use crate::provider::ProviderError;
use crate::ssh::SshError;
use crate::vpn::VpnError;

/// What a failed deployment was deploying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployTarget {
    Node,
    NodePool,
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployTarget::Node => write!(f, "node"),
            DeployTarget::NodePool => write!(f, "node pool"),
        }
    }
}

/// Which count a distribution mismatch refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountScope {
    Total,
    Master,
    Worker,
}

impl fmt::Display for CountScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountScope::Total => Ok(()),
            CountScope::Master => write!(f, " master"),
            CountScope::Worker => write!(f, " worker"),
        }
    }
}

/// Errors that can occur while orchestrating a cluster deployment
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("provider {0} not found")]
    ProviderNotFound(String),

    #[error("node {0} not found")]
    NodeNotFound(String),

    #[error("no nodes found for provider {0}")]
    NoNodesForProvider(String),

    #[error("no cloud providers enabled")]
    NoProvidersEnabled,

    #[error("no cloud providers initialized - run provider initialization first")]
    NoProvidersInitialized,

    #[error("failed to initialize provider {name}: {source}")]
    ProviderInit {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("{subsystem} validation failed: {details}")]
    ValidationFailed { subsystem: String, details: String },

    #[error("expected {expected}{scope} nodes, got {actual}")]
    DistributionMismatch {
        scope: CountScope,
        expected: u64,
        actual: u64,
    },

    /// Adapter error passed through unchanged
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("failed to deploy {target} {name}: {source}")]
    DeployFailed {
        target: DeployTarget,
        name: String,
        #[source]
        source: Box<OrchestratorError>,
    },

    #[error("failed to create network for provider {name}: {source}")]
    Network {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to configure firewall for provider {name}: {source}")]
    Firewall {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to create load balancer: {0}")]
    LoadBalancer(#[source] ProviderError),

    #[error("RKE manager not initialized - cannot install {0}")]
    RkeNotInitialized(&'static str),

    #[error("no master nodes available to bootstrap the cluster")]
    NoMasterNodes,

    #[error("failed to render {what}: {message}")]
    Render { what: String, message: String },

    #[error(transparent)]
    Ssh(#[from] SshError),

    #[error(transparent)]
    Vpn(#[from] VpnError),
}

impl OrchestratorError {
    pub fn validation(subsystem: impl Into<String>, details: impl Into<String>) -> Self {
        OrchestratorError::ValidationFailed {
            subsystem: subsystem.into(),
            details: details.into(),
        }
    }

    pub(crate) fn deploy(target: DeployTarget, name: &str, source: OrchestratorError) -> Self {
        OrchestratorError::DeployFailed {
            target,
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

//! Post-bootstrap plans: add-on manifests, storage classes, ingress controller

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::cluster::OrchestratorError;
use crate::config::{AddonConfig, IngressConfig, StorageClassConfig, StorageConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddonStep {
    pub name: String,
    pub command: String,
}

/// Enabled add-ons in declaration order, each applied with kubectl
pub fn plan_addons(addons: &[AddonConfig]) -> Result<Vec<AddonStep>, OrchestratorError> {
    addons
        .iter()
        .filter(|a| a.enabled)
        .map(|addon| {
            let url = addon.manifest_url.as_deref().ok_or_else(|| {
                OrchestratorError::validation(
                    "Addons",
                    format!("addon {} has no manifest_url", addon.name),
                )
            })?;
            let command = match &addon.namespace {
                Some(ns) => format!("kubectl apply -n {} -f {}", ns, url),
                None => format!("kubectl apply -f {}", url),
            };
            Ok(AddonStep {
                name: addon.name.clone(),
                command,
            })
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<&'a str, &'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageClassManifest<'a> {
    api_version: &'a str,
    kind: &'a str,
    metadata: ObjectMeta<'a>,
    provisioner: &'a str,
    reclaim_policy: &'a str,
    #[serde(skip_serializing_if = "no_parameters")]
    parameters: &'a BTreeMap<String, String>,
}

fn no_parameters(parameters: &&BTreeMap<String, String>) -> bool {
    parameters.is_empty()
}

fn to_yaml<T: Serialize>(what: &str, value: &T) -> Result<String, OrchestratorError> {
    serde_yaml::to_string(value).map_err(|e| OrchestratorError::Render {
        what: what.to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug)]
pub struct StorageManager {
    classes: Vec<StorageClassConfig>,
}

impl StorageManager {
    pub fn new(config: &StorageConfig) -> Result<Self, OrchestratorError> {
        let defaults: Vec<_> = config
            .classes
            .iter()
            .filter(|c| c.default)
            .map(|c| c.name.as_str())
            .collect();
        if defaults.len() > 1 {
            return Err(OrchestratorError::validation(
                "Storage",
                format!("multiple default storage classes: {}", defaults.join(", ")),
            ));
        }
        if let Some(c) = config
            .classes
            .iter()
            .find(|c| !matches!(c.reclaim_policy.as_str(), "Delete" | "Retain"))
        {
            return Err(OrchestratorError::validation(
                "Storage",
                format!(
                    "storage class {} has invalid reclaim policy '{}'",
                    c.name, c.reclaim_policy
                ),
            ));
        }
        Ok(Self {
            classes: config.classes.clone(),
        })
    }

    /// One StorageClass document per class
    pub fn manifests(&self) -> Result<Vec<String>, OrchestratorError> {
        self.classes
            .iter()
            .map(|class| {
                let mut annotations = BTreeMap::new();
                if class.default {
                    annotations.insert("storageclass.kubernetes.io/is-default-class", "true");
                }
                let manifest = StorageClassManifest {
                    api_version: "storage.k8s.io/v1",
                    kind: "StorageClass",
                    metadata: ObjectMeta {
                        name: &class.name,
                        namespace: None,
                        annotations,
                    },
                    provisioner: &class.provisioner,
                    reclaim_policy: &class.reclaim_policy,
                    parameters: &class.parameters,
                };
                debug!("Rendering storage class {}", class.name);
                to_yaml(&format!("storage class {}", class.name), &manifest)
            })
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngressClassSpec<'a> {
    controller: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngressClassManifest<'a> {
    api_version: &'a str,
    kind: &'a str,
    metadata: ObjectMeta<'a>,
    spec: IngressClassSpec<'a>,
}

#[derive(Debug)]
pub struct IngressManager {
    config: IngressConfig,
}

impl IngressManager {
    pub fn new(config: &IngressConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn hostnames(&self) -> &[String] {
        &self.config.hostnames
    }

    /// Default IngressClass for the configured controller
    pub fn manifest(&self) -> Result<String, OrchestratorError> {
        let controller = format!("k8s.io/ingress-{}", self.config.class);
        let mut annotations = BTreeMap::new();
        annotations.insert("ingressclass.kubernetes.io/is-default-class", "true");
        let manifest = IngressClassManifest {
            api_version: "networking.k8s.io/v1",
            kind: "IngressClass",
            metadata: ObjectMeta {
                name: &self.config.class,
                namespace: None,
                annotations,
            },
            spec: IngressClassSpec {
                controller: &controller,
            },
        };
        to_yaml("ingress class", &manifest)
    }
}

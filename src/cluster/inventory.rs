//! Node inventory - every node providers have materialized, grouped by provider
//!
//! The inventory only grows: the orchestrator appends whole deployment
//! results and never removes entries. Each provider's slot keeps insertion
//! order, which is the order deployments returned their nodes. An append
//! holds its provider's entry for the whole batch, so concurrent
//! deployments never interleave inside one result. Queries return owned
//! snapshots with providers in name order.

use std::collections::BTreeMap;

use dashmap::DashMap;

use super::error::OrchestratorError;
use super::roles::{is_master_node, is_worker_node};
use crate::provider::NodeOutput;

#[derive(Debug, Default)]
pub struct NodeInventory {
    slots: DashMap<String, Vec<NodeOutput>>,
}

impl NodeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append nodes to a provider's slot as one batch
    pub(crate) fn append(&self, provider: &str, nodes: Vec<NodeOutput>) {
        self.slots
            .entry(provider.to_string())
            .or_default()
            .extend(nodes);
    }

    /// Replace a provider's slot wholesale; lets tests stage pre-existing
    /// or inconsistent state
    #[cfg(test)]
    pub(crate) fn set_slot(&self, provider: &str, nodes: Vec<NodeOutput>) {
        self.slots.insert(provider.to_string(), nodes);
    }

    pub fn get_node_by_name(&self, name: &str) -> Result<NodeOutput, OrchestratorError> {
        self.snapshot()
            .into_values()
            .flatten()
            .find(|n| n.name == name)
            .ok_or_else(|| OrchestratorError::NodeNotFound(name.to_string()))
    }

    pub fn get_nodes_by_provider(&self, provider: &str) -> Result<Vec<NodeOutput>, OrchestratorError> {
        match self.slots.get(provider) {
            Some(nodes) if !nodes.is_empty() => Ok(nodes.value().clone()),
            _ => Err(OrchestratorError::NoNodesForProvider(provider.to_string())),
        }
    }

    pub fn get_master_nodes(&self) -> Vec<NodeOutput> {
        self.filter(is_master_node)
    }

    pub fn get_worker_nodes(&self) -> Vec<NodeOutput> {
        self.filter(is_worker_node)
    }

    /// Every node, providers in name order, each slot in insertion order
    pub fn all_nodes(&self) -> Vec<NodeOutput> {
        self.filter(|_| true)
    }

    /// Copy of the whole provider -> nodes mapping
    pub fn snapshot(&self) -> BTreeMap<String, Vec<NodeOutput>> {
        self.slots
            .iter()
            .map(|slot| (slot.key().clone(), slot.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().map(|slot| slot.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of nodes recorded for one provider
    pub fn slot_len(&self, provider: &str) -> usize {
        self.slots.get(provider).map_or(0, |nodes| nodes.len())
    }

    fn filter(&self, predicate: impl Fn(&NodeOutput) -> bool) -> Vec<NodeOutput> {
        self.snapshot()
            .into_values()
            .flatten()
            .filter(|n| predicate(n))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> NodeInventory {
        let inventory = NodeInventory::new();
        inventory.append(
            "aws",
            vec![
                NodeOutput::new("cp-1", "aws").with_role("master"),
                NodeOutput::new("wk-1", "aws").with_role("worker"),
            ],
        );
        inventory.append(
            "do",
            vec![NodeOutput::new("edge-1", "do").with_role("controlplane")],
        );
        inventory
    }

    #[test]
    fn test_get_nodes_by_provider() {
        let inventory = seeded();
        assert_eq!(inventory.get_nodes_by_provider("aws").unwrap().len(), 2);
        assert_eq!(inventory.get_nodes_by_provider("do").unwrap().len(), 1);

        let err = inventory.get_nodes_by_provider("gcp").unwrap_err();
        assert_eq!(err.to_string(), "no nodes found for provider gcp");
    }

    #[test]
    fn test_empty_slot_counts_as_missing() {
        let inventory = seeded();
        inventory.set_slot("hetzner", Vec::new());
        let err = inventory.get_nodes_by_provider("hetzner").unwrap_err();
        assert_eq!(err.to_string(), "no nodes found for provider hetzner");
    }

    #[test]
    fn test_get_node_by_name_is_case_sensitive() {
        let inventory = seeded();
        assert_eq!(inventory.get_node_by_name("edge-1").unwrap().provider, "do");

        let err = inventory.get_node_by_name("EDGE-1").unwrap_err();
        assert_eq!(err.to_string(), "node EDGE-1 not found");
    }

    #[test]
    fn test_get_node_by_name_on_empty_inventory() {
        let inventory = NodeInventory::new();
        assert!(matches!(
            inventory.get_node_by_name("anything"),
            Err(OrchestratorError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_role_queries() {
        let inventory = seeded();
        let masters: Vec<_> = inventory
            .get_master_nodes()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(masters, vec!["cp-1", "edge-1"]);
        assert_eq!(inventory.get_worker_nodes().len(), 1);
    }

    #[test]
    fn test_role_queries_never_fail_when_empty() {
        let inventory = NodeInventory::new();
        assert!(inventory.get_master_nodes().is_empty());
        assert!(inventory.get_worker_nodes().is_empty());

        inventory.set_slot("aws", vec![NodeOutput::new("unlabeled", "aws")]);
        assert!(inventory.get_master_nodes().is_empty());
        assert!(inventory.get_worker_nodes().is_empty());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let inventory = NodeInventory::new();
        inventory.append("aws", vec![NodeOutput::new("b", "aws")]);
        inventory.append(
            "aws",
            vec![NodeOutput::new("a", "aws"), NodeOutput::new("c", "aws")],
        );
        let names: Vec<_> = inventory
            .get_nodes_by_provider("aws")
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(inventory.len(), 3);
        assert_eq!(inventory.slot_len("aws"), 3);
        assert_eq!(inventory.slot_len("gcp"), 0);
    }

    #[test]
    fn test_concurrent_batches_stay_contiguous() {
        let inventory = NodeInventory::new();
        std::thread::scope(|scope| {
            for batch in 0..8 {
                let inventory = &inventory;
                scope.spawn(move || {
                    let nodes = (0..4)
                        .map(|i| NodeOutput::new(format!("b{}-{}", batch, i), "aws"))
                        .collect();
                    inventory.append("aws", nodes);
                });
            }
        });

        let names: Vec<_> = inventory
            .get_nodes_by_provider("aws")
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names.len(), 32);
        for chunk in names.chunks(4) {
            let batch = chunk[0].split('-').next().unwrap();
            assert!(chunk.iter().all(|n| n.starts_with(&format!("{}-", batch))));
        }
    }
}

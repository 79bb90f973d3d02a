//! Post-deployment check that the inventory matches the declared node pools
//!
//! Pools listing several roles count toward every one of them, so a pool
//! declared `[master, worker]` raises both the expected master and the
//! expected worker totals by its full count. The role totals can therefore
//! exceed the overall total; documents in the wild rely on this arithmetic.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::{CountScope, OrchestratorError};
use super::inventory::NodeInventory;
use super::roles::{declares_master, declares_worker, is_master_node, is_worker_node};
use crate::config::NodePool;

/// Node counts by role
///
/// Pool counts are `u32` but sums are kept in `u64` so any number of
/// pools adds up without overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub total: u64,
    pub masters: u64,
    pub workers: u64,
}

impl Distribution {
    /// Counts the pools declare
    pub fn expected<'a>(pools: impl IntoIterator<Item = &'a NodePool>) -> Self {
        pools.into_iter().fold(Self::default(), |mut acc, pool| {
            let count = u64::from(pool.count);
            acc.total += count;
            if declares_master(&pool.roles) {
                acc.masters += count;
            }
            if declares_worker(&pool.roles) {
                acc.workers += count;
            }
            acc
        })
    }

    /// Counts present in the inventory, by `role` label
    pub fn actual(inventory: &NodeInventory) -> Self {
        inventory
            .all_nodes()
            .iter()
            .fold(Self::default(), |mut acc, node| {
                acc.total += 1;
                if is_master_node(node) {
                    acc.masters += 1;
                }
                if is_worker_node(node) {
                    acc.workers += 1;
                }
                acc
            })
    }
}

/// Verify node distribution: total first, then masters, then workers.
///
/// Role checks only run when some pool declares that role.
pub fn verify_node_distribution(
    pools: &BTreeMap<String, NodePool>,
    inventory: &NodeInventory,
) -> Result<(), OrchestratorError> {
    let expected = Distribution::expected(pools.values());
    let actual = Distribution::actual(inventory);

    if actual.total != expected.total {
        return Err(OrchestratorError::DistributionMismatch {
            scope: CountScope::Total,
            expected: expected.total,
            actual: actual.total,
        });
    }

    if expected.masters > 0 && actual.masters != expected.masters {
        return Err(OrchestratorError::DistributionMismatch {
            scope: CountScope::Master,
            expected: expected.masters,
            actual: actual.masters,
        });
    }

    if expected.workers > 0 && actual.workers != expected.workers {
        return Err(OrchestratorError::DistributionMismatch {
            scope: CountScope::Worker,
            expected: expected.workers,
            actual: actual.workers,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::NodeOutput;

    fn pools(entries: Vec<NodePool>) -> BTreeMap<String, NodePool> {
        entries.into_iter().map(|p| (p.name.clone(), p)).collect()
    }

    fn nodes(prefix: &str, role: &str, count: usize) -> Vec<NodeOutput> {
        (1..=count)
            .map(|i| NodeOutput::new(format!("{}-{}", prefix, i), "aws").with_role(role))
            .collect()
    }

    #[test]
    fn test_empty_passes() {
        assert!(verify_node_distribution(&BTreeMap::new(), &NodeInventory::new()).is_ok());
    }

    #[test]
    fn test_matching_distribution() {
        let pools = pools(vec![
            NodePool::new("cp", "aws", 3).with_roles(["master", "etcd"]),
            NodePool::new("wk", "do", 2).with_roles(["worker"]),
        ]);
        let inventory = NodeInventory::new();
        inventory.append("aws", nodes("cp", "master", 3));
        inventory.append("do", nodes("wk", "worker", 2));

        assert!(verify_node_distribution(&pools, &inventory).is_ok());
    }

    #[test]
    fn test_missing_master() {
        let pools = pools(vec![NodePool::new("cp", "aws", 3).with_roles(["master"])]);
        let inventory = NodeInventory::new();
        let mut staged = nodes("cp", "master", 2);
        staged.push(NodeOutput::new("stray", "aws").with_role("etcd"));
        inventory.set_slot("aws", staged);

        let err = verify_node_distribution(&pools, &inventory).unwrap_err();
        assert_eq!(err.to_string(), "expected 3 master nodes, got 2");
    }

    #[test]
    fn test_total_checked_first() {
        let pools = pools(vec![NodePool::new("cp", "aws", 3).with_roles(["master"])]);
        let inventory = NodeInventory::new();
        inventory.set_slot("aws", nodes("cp", "master", 2));

        let err = verify_node_distribution(&pools, &inventory).unwrap_err();
        assert_eq!(err.to_string(), "expected 3 nodes, got 2");
    }

    #[test]
    fn test_worker_mismatch() {
        let pools = pools(vec![
            NodePool::new("cp", "aws", 1).with_roles(["controlplane"]),
            NodePool::new("wk", "aws", 2).with_roles(["worker"]),
        ]);
        let inventory = NodeInventory::new();
        let mut staged = nodes("cp", "controlplane", 1);
        staged.extend(nodes("wk", "worker", 1));
        staged.push(NodeOutput::new("unlabeled", "aws"));
        inventory.set_slot("aws", staged);

        let err = verify_node_distribution(&pools, &inventory).unwrap_err();
        assert_eq!(err.to_string(), "expected 2 worker nodes, got 1");
    }

    #[test]
    fn test_role_checks_skipped_when_undeclared() {
        let pools = pools(vec![NodePool::new("misc", "aws", 2).with_roles(["etcd"])]);
        let inventory = NodeInventory::new();
        inventory.set_slot("aws", nodes("misc", "worker", 2));

        assert!(verify_node_distribution(&pools, &inventory).is_ok());
    }

    #[test]
    fn test_multi_role_pool_counts_toward_both_roles() {
        let pools = pools(vec![NodePool::new("all", "aws", 2).with_roles(["master", "worker"])]);
        let expected = Distribution::expected(pools.values());
        assert_eq!(
            expected,
            Distribution {
                total: 2,
                masters: 2,
                workers: 2
            }
        );

        // A node carries a single role label, so such a pool can never satisfy
        // both role totals at once.
        let inventory = NodeInventory::new();
        inventory.set_slot("aws", nodes("all", "master", 2));
        let err = verify_node_distribution(&pools, &inventory).unwrap_err();
        assert_eq!(err.to_string(), "expected 2 worker nodes, got 0");
    }

    #[test]
    fn test_pool_counts_past_u32_max_do_not_wrap() {
        let pools = pools(vec![
            NodePool::new("a", "aws", u32::MAX).with_roles(["worker"]),
            NodePool::new("b", "aws", 1).with_roles(["worker"]),
        ]);
        let expected = Distribution::expected(pools.values());
        assert_eq!(expected.total, u64::from(u32::MAX) + 1);
        assert_eq!(expected.workers, u64::from(u32::MAX) + 1);

        let err = verify_node_distribution(&pools, &NodeInventory::new()).unwrap_err();
        assert_eq!(err.to_string(), "expected 4294967296 nodes, got 0");
    }
}

use crate::core::{LogicalClock, NodeId, RecoverError, Result, VnodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the cluster routing table.
///
/// Fetched once per run from a seed node and never mutated locally; routing
/// changes go out to peers as `setroute` commands instead.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RoutingTable {
    /// Cluster members in routing order.
    pub nodes: Vec<NodeId>,
    /// Owners of each vnode; an empty list means the vnode is lost.
    #[serde(default)]
    pub v_idx: BTreeMap<VnodeId, Vec<NodeId>>,
    /// Logical clock of each vnode.
    #[serde(default)]
    pub v_clk: BTreeMap<VnodeId, LogicalClock>,
}

impl RoutingTable {
    /// Creates a table with every vnode unowned.
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    /// Parses the JSON body of a `routingdump json` reply.
    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Checks the snapshot is usable for recovery.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(RecoverError::Routing(
                "routing table has no nodes".to_string(),
            ));
        }
        if let Some(node) = self.nodes.iter().find(|node| node.trim().is_empty()) {
            return Err(RecoverError::Routing(format!(
                "routing table has an empty node id '{}'",
                node
            )));
        }
        Ok(())
    }

    /// Sets the owners and clock of a vnode.
    pub fn assign(&mut self, vnode: VnodeId, owners: Vec<NodeId>, clock: LogicalClock) {
        self.v_idx.insert(vnode, owners);
        self.v_clk.insert(vnode, clock);
    }

    /// Current owners of `vnode`; empty when lost or unknown.
    pub fn owners(&self, vnode: VnodeId) -> &[NodeId] {
        self.v_idx.get(&vnode).map(Vec::as_slice).unwrap_or_default()
    }

    /// Logical clock of `vnode`, zero when the table has none.
    pub fn clock(&self, vnode: VnodeId) -> LogicalClock {
        self.v_clk.get(&vnode).copied().unwrap_or_default()
    }

    /// Every vnode present in the index, ascending.
    pub fn vnodes(&self) -> Vec<VnodeId> {
        self.v_idx.keys().copied().collect()
    }

    /// Vnodes with no owner, ascending.
    pub fn lost_vnodes(&self) -> Vec<VnodeId> {
        self.v_idx
            .iter()
            .filter(|(_, owners)| owners.is_empty())
            .map(|(vnode, _)| *vnode)
            .collect()
    }

    /// First node of the member list, the one asked for loss history.
    pub fn primary_node(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }
}

use crate::core::{NodeId, VnodeId};
use std::fmt;

/// Outcome of a completed recovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Vnodes selected for recovery, in detection order.
    pub lost: Vec<VnodeId>,
    /// Shard units processed.
    pub units: Vec<String>,
    /// One entry per (unit, vnode) pushed.
    pub assignments: Vec<VnodeAssignment>,
    /// `setroute` broadcasts that did not reach every node.
    pub broadcast_failures: Vec<BroadcastFailure>,
}

impl RecoveryReport {
    pub fn new(lost: Vec<VnodeId>) -> Self {
        Self {
            lost,
            ..Self::default()
        }
    }

    /// Nodes that received `vnode`, over all units.
    pub fn nodes_for(&self, vnode: VnodeId) -> Vec<&str> {
        let mut nodes: Vec<&str> = self
            .assignments
            .iter()
            .filter(|a| a.vnode == vnode)
            .flat_map(|a| a.nodes.iter().map(String::as_str))
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    pub fn records_pushed(&self) -> u64 {
        self.assignments.iter().map(|a| a.records).sum()
    }
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lost vnodes, {} units, {} pushes, {} records, {} broadcast failures",
            self.lost.len(),
            self.units.len(),
            self.assignments.len(),
            self.records_pushed(),
            self.broadcast_failures.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnodeAssignment {
    pub unit: String,
    pub vnode: VnodeId,
    pub nodes: Vec<NodeId>,
    /// True when the vnode had no owner and was placed by this run.
    pub new_assignment: bool,
    pub records: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastFailure {
    pub vnode: VnodeId,
    pub command: String,
    pub error: String,
}

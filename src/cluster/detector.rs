use super::RoutingTable;
use crate::core::{LostSince, RecoverError, Result, VnodeId};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

/// Which vnodes a run should repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryMode {
    /// Vnodes without an owner, plus those logged lost since the cutoff.
    Lost { since: Option<LostSince> },
    /// Every vnode in the routing index: a forced full rebuild.
    AllData,
}

impl Default for RecoveryMode {
    fn default() -> Self {
        Self::Lost { since: None }
    }
}

/// Source of a node's history of lost vnodes.
#[async_trait]
pub trait LossHistory: Send + Sync {
    async fn history_of_lost(&self, node: &str, since: &LostSince) -> Result<Vec<VnodeId>>;
}

/// Computes the vnodes to recover, in detection order.
///
/// Snapshot results come first (ascending), history entries not already
/// present follow in the order the node reported them.
pub async fn detect_lost_vnodes(
    table: &RoutingTable,
    mode: &RecoveryMode,
    history: &dyn LossHistory,
) -> Result<Vec<VnodeId>> {
    let since = match mode {
        RecoveryMode::AllData => return Ok(table.vnodes()),
        RecoveryMode::Lost { since } => since,
    };

    let lost = table.lost_vnodes();
    let Some(since) = since else {
        return Ok(lost);
    };

    let node = table
        .primary_node()
        .ok_or_else(|| RecoverError::Routing("routing table has no nodes".to_string()))?;
    let logged = history.history_of_lost(node, since).await?;
    info!(node, since = %since, logged = logged.len(), "fetched history of lost vnodes");
    Ok(union_in_order(lost, logged))
}

/// `base ∪ extra` without duplicates, keeping first-seen order.
pub fn union_in_order(base: Vec<VnodeId>, extra: Vec<VnodeId>) -> Vec<VnodeId> {
    let mut seen = HashSet::with_capacity(base.len() + extra.len());
    base.into_iter()
        .chain(extra)
        .filter(|vnode| seen.insert(*vnode))
        .collect()
}

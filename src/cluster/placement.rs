use crate::core::{NodeId, VnodeId};
use rand::seq::SliceRandom;

/// Chooses the node that takes over an ownerless vnode.
pub trait PlacementStrategy: Send + Sync {
    /// Picks one of `nodes`, or `None` when the list is empty.
    fn place(&self, vnode: VnodeId, nodes: &[NodeId]) -> Option<NodeId>;
}

/// Uniform random choice over the cluster member list.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRandomPlacement;

impl PlacementStrategy for UniformRandomPlacement {
    fn place(&self, _vnode: VnodeId, nodes: &[NodeId]) -> Option<NodeId> {
        nodes.choose(&mut rand::thread_rng()).cloned()
    }
}

/// Deterministic choice: `vnode mod len` over the member list.
///
/// Gives reproducible runs, e.g. when rehearsing a recovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuloPlacement;

impl PlacementStrategy for ModuloPlacement {
    fn place(&self, vnode: VnodeId, nodes: &[NodeId]) -> Option<NodeId> {
        if nodes.is_empty() {
            return None;
        }
        nodes.get(vnode as usize % nodes.len()).cloned()
    }
}

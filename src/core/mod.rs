pub mod error;
pub mod types;

pub use error::{RecoverError, Result};
pub use types::{LogicalClock, LostSince, NodeId, VnodeId, node_id, split_node_id};

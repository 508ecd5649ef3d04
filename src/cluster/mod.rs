//! Routing snapshot and the decisions made from it: which vnodes are lost
//! and where ownerless ones go.

pub mod detector;
pub mod placement;
pub mod routing;

pub use detector::{LossHistory, RecoveryMode, detect_lost_vnodes, union_in_order};
pub use placement::{ModuloPlacement, PlacementStrategy, UniformRandomPlacement};
pub use routing::RoutingTable;

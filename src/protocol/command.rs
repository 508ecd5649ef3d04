//! Lines of the node control protocol.

use crate::core::{LogicalClock, LostSince, VnodeId};

/// Handshake reply of a node ready to receive a vnode stream.
pub const READY: &str = "READY";

/// Acknowledgment of a fully stored vnode stream.
pub const STORED: &str = "STORED";

/// Closes multi-line replies.
pub const END: &str = "END";

/// Push command understood by ROMA-style storage nodes.
pub const DEFAULT_PUSH_COMMAND: &str = "spushv";

pub fn history_of_lost(since: &LostSince) -> String {
    format!("history_of_lost {}", since)
}

pub fn push_vnode(push_command: &str, unit: &str, vnode: VnodeId) -> String {
    format!("{} {} {}", push_command, unit, vnode)
}

pub fn setroute(vnode: VnodeId, clock: LogicalClock, node: &str) -> String {
    format!("setroute {} {} {}", vnode, clock, node)
}

pub fn routing_dump() -> &'static str {
    "routingdump json"
}

/// Parses one line of a `history_of_lost` reply.
pub fn parse_history_line(line: &str) -> Option<VnodeId> {
    line.trim().parse().ok()
}

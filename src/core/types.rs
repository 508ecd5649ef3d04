use super::{RecoverError, Result};
use std::fmt;

/// Identity of a cluster node, `address:port`.
pub type NodeId = String;

/// Id of a virtual partition.
pub type VnodeId = u32;

/// Per-vnode logical version number.
pub type LogicalClock = u32;

/// Cutoff for the history-of-lost query, `yyyymmddhhmmss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostSince(String);

impl LostSince {
    pub const LEN: usize = 14;

    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != Self::LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RecoverError::Usage(
                "yyyymmddhhmmss format mismatch.".to_string(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LostSince {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for LostSince {
    type Err = RecoverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Builds the node id of a seed from the address and port given on the command line.
pub fn node_id(address: &str, port: u16) -> NodeId {
    format!("{}:{}", address, port)
}

/// Splits a node id into host and port.
///
/// Accepts `host:port` and the older `host_port` spelling.
pub fn split_node_id(node: &str) -> Result<(&str, u16)> {
    let (host, port) = node
        .rsplit_once(':')
        .or_else(|| node.rsplit_once('_'))
        .ok_or_else(|| RecoverError::Routing(format!("malformed node id '{}'", node)))?;
    if host.is_empty() {
        return Err(RecoverError::Routing(format!("malformed node id '{}'", node)));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| RecoverError::Routing(format!("malformed port in node id '{}'", node)))?;
    Ok((host, port))
}

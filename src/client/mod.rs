//! Request/response helpers over pooled node connections.

pub mod pusher;

use crate::cluster::{LossHistory, RoutingTable};
use crate::connection::pool::ConnectionPool;
use crate::core::{LostSince, NodeId, RecoverError, Result, VnodeId};
use crate::protocol::command::{self, END};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, error};

pub use pusher::{PushOutcome, PushPhase, VnodePusher};

/// Sends control commands to cluster nodes.
#[derive(Clone)]
pub struct CommandClient {
    pool: ConnectionPool,
}

impl CommandClient {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Sends one line to `node` and returns its one-line reply.
    pub async fn send_cmd(&self, node: &str, line: &str) -> Result<String> {
        let result = self.exchange(node, line).await;
        if let Err(err) = &result {
            error!(node, command = line, error = %err, "send command failed");
        }
        result
    }

    async fn exchange(&self, node: &str, line: &str) -> Result<String> {
        let mut conn = self.pool.get_connection(node).await?;
        conn.write_line(line).await?;
        let reply = conn.read_line().await?;
        conn.release();
        debug!(node, command = line, reply = %reply, "command answered");
        Ok(reply)
    }

    /// Sends `line` to every node of `nodes` not listed in `excluded`.
    ///
    /// Stops at the first failure; nodes already contacted keep whatever the
    /// command did to them.
    pub async fn broadcast_cmd(
        &self,
        nodes: &[NodeId],
        line: &str,
        excluded: &[NodeId],
    ) -> Result<BTreeMap<NodeId, String>> {
        let mut replies = BTreeMap::new();
        for node in nodes.iter().filter(|node| !excluded.contains(node)) {
            let reply = self.send_cmd(node, line).await?;
            replies.insert(node.clone(), reply);
        }
        Ok(replies)
    }

    /// Vnodes that `node` logged as lost at or after `since`.
    pub async fn history_of_lost(&self, node: &str, since: &LostSince) -> Result<Vec<VnodeId>> {
        let mut conn = self.pool.get_connection(node).await?;
        conn.write_line(&command::history_of_lost(since)).await?;

        let mut vnodes = Vec::new();
        loop {
            let line = conn.read_line().await?;
            if line == END {
                break;
            }
            match command::parse_history_line(&line) {
                Some(vnode) => vnodes.push(vnode),
                None => {
                    return Err(RecoverError::Protocol {
                        node: node.to_string(),
                        expected: format!("vnode id or {}", END),
                        actual: line,
                    });
                }
            }
        }
        conn.release();
        Ok(vnodes)
    }

    /// Fetches the routing table snapshot of `node`.
    pub async fn routing_dump(&self, node: &str) -> Result<RoutingTable> {
        let mut conn = self.pool.get_connection(node).await?;
        conn.write_line(command::routing_dump()).await?;

        let mut body = String::new();
        loop {
            let line = conn.read_line().await?;
            if line == END {
                break;
            }
            body.push_str(&line);
            body.push('\n');
        }
        conn.release();

        if body.trim().is_empty() {
            return Err(RecoverError::Protocol {
                node: node.to_string(),
                expected: "routing table".to_string(),
                actual: END.to_string(),
            });
        }
        RoutingTable::from_json(&body)
    }
}

#[async_trait]
impl LossHistory for CommandClient {
    async fn history_of_lost(&self, node: &str, since: &LostSince) -> Result<Vec<VnodeId>> {
        CommandClient::history_of_lost(self, node, since).await
    }
}

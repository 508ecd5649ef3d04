// ============================================================================
// vnode-recover Library
// ============================================================================

pub mod core;
pub mod connection;
pub mod protocol;
pub mod cluster;
pub mod client;
pub mod storage;
pub mod recovery;

// Re-export main types for convenience
pub use core::{LostSince, NodeId, RecoverError, Result, VnodeId};

// Re-export connection API
pub use connection::{
    NodeConnection,
    config::ConnectionConfig,
    pool::{ConnectionPool, PoolGuard, PoolStats},
    transport::{NodeConnector, TcpConnector},
};

pub use client::{CommandClient, PushOutcome, PushPhase, VnodePusher};
pub use cluster::{RecoveryMode, RoutingTable};
pub use recovery::{Recovery, RecoveryConfig, RecoveryReport};

// ============================================================================
// High-level entry point
// ============================================================================

/// Run a recovery against a live cluster over TCP
///
/// Builds a connection pool from `connection`, fetches the routing snapshot
/// from `config.seed` and pushes every lost vnode found under
/// `config.storage_root`.
///
/// # Examples
///
/// ```no_run
/// use vnode_recover::{ConnectionConfig, RecoveryConfig, RecoveryMode, recover};
///
/// # async fn demo() -> vnode_recover::Result<()> {
/// let config = RecoveryConfig::new("localhost:11211", "/var/roma/localhost_11211")
///     .mode(RecoveryMode::AllData);
///
/// let report = recover(config, ConnectionConfig::default()).await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub async fn recover(config: RecoveryConfig, connection: ConnectionConfig) -> Result<RecoveryReport> {
    let pool = ConnectionPool::tcp(connection)?;
    let report = Recovery::new(config, pool.clone())?.run().await;
    pool.close_idle()?;
    report
}

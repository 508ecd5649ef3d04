use super::{NodeConnection, config::ConnectionConfig, transport::NodeConnector};
use crate::core::{RecoverError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Connection pool
///
/// Keeps idle connections per node so consecutive commands to the same node
/// reuse one socket. Passed explicitly to every component that talks to the
/// cluster; there is no process-wide pool.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
    connector: Arc<dyn NodeConnector>,
}

struct PoolShared {
    /// Pool configuration
    config: ConnectionConfig,
    /// Idle connections by node
    idle: Mutex<HashMap<String, VecDeque<IdleConnection>>>,
    /// Connections currently open, idle or borrowed
    open: AtomicUsize,
    /// Connections currently borrowed
    active: AtomicUsize,
    /// Next connection ID
    next_id: AtomicU64,
}

/// An idle connection parked in the pool
struct IdleConnection {
    connection: NodeConnection,
    last_used: Instant,
}

impl IdleConnection {
    fn new(connection: NodeConnection) -> Self {
        Self {
            connection,
            last_used: Instant::now(),
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        if let Some(lifetime) = max_lifetime {
            self.connection.created_at().elapsed() > lifetime
        } else {
            false
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        if let Some(timeout) = idle_timeout {
            self.last_used.elapsed() > timeout
        } else {
            false
        }
    }
}

impl ConnectionPool {
    /// Create a new pool on top of a connector
    pub fn new(config: ConnectionConfig, connector: Arc<dyn NodeConnector>) -> Result<Self> {
        config.validate().map_err(RecoverError::Usage)?;

        Ok(Self {
            shared: Arc::new(PoolShared {
                config,
                idle: Mutex::new(HashMap::new()),
                open: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }),
            connector,
        })
    }

    /// Create a pool that dials nodes over TCP
    pub fn tcp(config: ConnectionConfig) -> Result<Self> {
        let connector = super::transport::TcpConnector::new(config.connect_timeout);
        Self::new(config, Arc::new(connector))
    }

    /// Borrow a connection to `node`
    ///
    /// The returned guard must be [`released`](PoolGuard::release) after a
    /// clean exchange to be reused. A guard dropped on any other path closes
    /// its connection. The borrow is accounted as returned in both cases.
    pub async fn get_connection(&self, node: &str) -> Result<PoolGuard> {
        let connection = match self.try_get_idle(node)? {
            Some(connection) => connection,
            None => self.create_connection(node).await?,
        };

        self.shared.active.fetch_add(1, Ordering::SeqCst);
        Ok(PoolGuard {
            connection: Some(connection),
            shared: Arc::clone(&self.shared),
            broken: false,
        })
    }

    /// Pop a reusable idle connection, evicting stale ones on the way
    fn try_get_idle(&self, node: &str) -> Result<Option<NodeConnection>> {
        let config = &self.shared.config;
        let mut idle = self.shared.idle.lock()?;
        let Some(queue) = idle.get_mut(node) else {
            return Ok(None);
        };

        while let Some(parked) = queue.pop_front() {
            if parked.is_expired(config.max_lifetime)
                || parked.is_idle_too_long(config.idle_timeout)
            {
                debug!(node, id = parked.connection.id(), "evicting stale connection");
                self.shared.open.fetch_sub(1, Ordering::SeqCst);
                continue;
            }
            return Ok(Some(parked.connection));
        }
        Ok(None)
    }

    async fn create_connection(&self, node: &str) -> Result<NodeConnection> {
        let stream = self.connector.connect(node).await?;
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        debug!(node, id, "opened connection");
        Ok(NodeConnection::new(id, node, stream))
    }

    /// Close every idle connection
    pub fn close_idle(&self) -> Result<()> {
        let mut idle = self.shared.idle.lock()?;
        let closed: usize = idle.drain().map(|(_, queue)| queue.len()).sum();
        self.shared.open.fetch_sub(closed, Ordering::SeqCst);
        Ok(())
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let idle_connections = self
            .shared
            .idle
            .lock()
            .map(|idle| idle.values().map(VecDeque::len).sum())
            .unwrap_or(0);

        PoolStats {
            open_connections: self.shared.open.load(Ordering::SeqCst),
            idle_connections,
            active_connections: self.shared.active.load(Ordering::SeqCst),
        }
    }
}

impl PoolShared {
    fn park(&self, connection: NodeConnection) {
        let node = connection.node().to_string();
        match self.idle.lock() {
            Ok(mut idle) => {
                let queue = idle.entry(node).or_default();
                if queue.len() < self.config.max_idle_per_node {
                    queue.push_back(IdleConnection::new(connection));
                    return;
                }
            }
            Err(err) => {
                warn!(node = %node, error = %err, "pool lock poisoned, closing connection");
            }
        }
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub open_connections: usize,
    pub idle_connections: usize,
    pub active_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {} open, {} active, {} idle",
            self.open_connections, self.active_connections, self.idle_connections
        )
    }
}

/// RAII guard for a borrowed node connection
///
/// Any I/O error seen through the guard marks it broken; broken connections
/// are never handed out again.
pub struct PoolGuard {
    connection: Option<NodeConnection>,
    shared: Arc<PoolShared>,
    broken: bool,
}

impl PoolGuard {
    /// Get a reference to the connection
    pub fn connection(&mut self) -> &mut NodeConnection {
        self.connection
            .as_mut()
            .expect("Connection already returned to pool")
    }

    /// Node the borrowed connection talks to
    pub fn node(&self) -> &str {
        self.connection
            .as_ref()
            .map(NodeConnection::node)
            .unwrap_or_default()
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Mark the connection as unusable, e.g. after abandoning a half-written stream
    pub fn discard(&mut self) {
        self.broken = true;
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let result = self.connection().write_line(line).await;
        self.track(result)
    }

    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let result = self.connection().write_raw(data).await;
        self.track(result)
    }

    pub async fn flush(&mut self) -> Result<()> {
        let result = self.connection().flush().await;
        self.track(result)
    }

    pub async fn read_line(&mut self) -> Result<String> {
        let result = self.connection().read_line().await;
        self.track(result)
    }

    /// Return the connection to the pool for reuse
    pub fn release(mut self) {
        if self.broken {
            return;
        }
        if let Some(connection) = self.connection.take() {
            self.shared.park(connection);
        }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!(node = connection.node(), id = connection.id(), "closing unreleased connection");
            self.shared.open.fetch_sub(1, Ordering::SeqCst);
        }
        self.shared.active.fetch_sub(1, Ordering::SeqCst);
    }
}

use std::time::Duration;

/// Node connection pool configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Bound on establishing a TCP connection. `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,

    /// Maximum number of idle connections kept per node
    pub max_idle_per_node: usize,

    /// Connection idle timeout
    pub idle_timeout: Option<Duration>,

    /// Maximum connection lifetime
    pub max_lifetime: Option<Duration>,
}

impl ConnectionConfig {
    /// Create a new connection configuration
    pub fn new() -> Self {
        Self {
            connect_timeout: None,
            max_idle_per_node: 4,
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set maximum idle connections per node
    pub fn max_idle_per_node(mut self, max: usize) -> Self {
        self.max_idle_per_node = max;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set maximum lifetime
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout == Some(Duration::ZERO) {
            return Err("connect_timeout must be > 0".to_string());
        }

        if let (Some(idle), Some(lifetime)) = (self.idle_timeout, self.max_lifetime) {
            if idle > lifetime {
                return Err("idle_timeout cannot exceed max_lifetime".to_string());
            }
        }

        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

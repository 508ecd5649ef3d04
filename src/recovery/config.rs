use crate::client::pusher::DEFAULT_STREAM_THROTTLE;
use crate::cluster::RecoveryMode;
use crate::core::NodeId;
use crate::protocol::DEFAULT_PUSH_COMMAND;
use std::path::PathBuf;
use std::time::Duration;

/// Settings of one recovery run
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Node the routing snapshot is fetched from
    pub seed: NodeId,

    /// Directory with one subdirectory per shard unit
    pub storage_root: PathBuf,

    /// Which vnodes to repair
    pub mode: RecoveryMode,

    /// Command opening a vnode stream on the target
    pub push_command: String,

    /// Fixed pause between streamed records
    pub stream_throttle: Duration,
}

impl RecoveryConfig {
    pub fn new(seed: impl Into<NodeId>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            seed: seed.into(),
            storage_root: storage_root.into(),
            mode: RecoveryMode::default(),
            push_command: DEFAULT_PUSH_COMMAND.to_string(),
            stream_throttle: DEFAULT_STREAM_THROTTLE,
        }
    }

    pub fn mode(mut self, mode: RecoveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn push_command(mut self, push_command: impl Into<String>) -> Self {
        self.push_command = push_command.into();
        self
    }

    pub fn stream_throttle(mut self, throttle: Duration) -> Self {
        self.stream_throttle = throttle;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.seed.trim().is_empty() {
            return Err("seed node cannot be empty".to_string());
        }

        let command = self.push_command.trim();
        if command.is_empty() || command.contains(char::is_whitespace) {
            return Err(format!("invalid push command '{}'", self.push_command));
        }

        Ok(())
    }
}

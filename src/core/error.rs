use super::types::VnodeId;
use crate::client::PushPhase;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecoverError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Protocol error from '{node}': expected '{expected}', got '{actual}'")]
    Protocol {
        node: String,
        expected: String,
        actual: String,
    },

    #[error("Push of vnode {vnode} to '{node}' rejected at {phase}: {response}")]
    PushRejected {
        vnode: VnodeId,
        node: String,
        phase: PushPhase,
        response: String,
    },

    #[error("Connection error on '{node}': {source}")]
    Connection {
        node: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to '{0}' closed by peer")]
    ConnectionClosed(String),

    #[error("Unsupported storage format '{extension}' in {}", path.display())]
    UnsupportedStorageFormat { path: PathBuf, extension: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record codec error: {0}")]
    Codec(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl RecoverError {
    /// Wraps an I/O failure with the node it happened on.
    pub fn connection(node: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connection {
            node: node.into(),
            source,
        }
    }

    /// True for failures of the transport itself, as opposed to an
    /// unexpected but well-formed answer.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::ConnectionClosed(_))
    }
}

pub type Result<T> = std::result::Result<T, RecoverError>;

impl<T> From<std::sync::PoisonError<T>> for RecoverError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<rusqlite::Error> for RecoverError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RecoverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Routing(format!("malformed routing dump: {}", err))
    }
}

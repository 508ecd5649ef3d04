pub mod config;
pub mod pool;
pub mod transport;

use crate::core::{RecoverError, Result};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use transport::BoxedNodeStream;

/// Connection to one cluster node
///
/// Speaks the line-oriented control protocol and carries raw binary frames
/// for vnode streams. Every error is reported with the node it happened on.
pub struct NodeConnection {
    /// Unique connection ID
    id: u64,
    /// Node this connection talks to
    node: String,
    /// Buffered socket
    stream: BufStream<BoxedNodeStream>,
    created_at: Instant,
}

impl NodeConnection {
    pub(crate) fn new(id: u64, node: impl Into<String>, stream: BoxedNodeStream) -> Self {
        Self {
            id,
            node: node.into(),
            stream: BufStream::new(stream),
            created_at: Instant::now(),
        }
    }

    /// Get connection ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Node at the other end
    pub fn node(&self) -> &str {
        &self.node
    }

    pub(crate) fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Write one command line. The CRLF terminator is appended here.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end_matches(['\r', '\n']);
        self.write_raw(line.as_bytes()).await?;
        self.write_raw(b"\r\n").await?;
        self.flush().await
    }

    /// Queue raw bytes. Call [`flush`](Self::flush) to push them out.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(|e| RecoverError::connection(&self.node, e))
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.stream
            .flush()
            .await
            .map_err(|e| RecoverError::connection(&self.node, e))
    }

    /// Read one response line with its line terminator stripped.
    ///
    /// End of stream before any byte is reported as `ConnectionClosed`.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .stream
            .read_line(&mut line)
            .await
            .map_err(|e| RecoverError::connection(&self.node, e))?;
        if read == 0 {
            return Err(RecoverError::ConnectionClosed(self.node.clone()));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}

impl std::fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConnection")
            .field("id", &self.id)
            .field("node", &self.node)
            .finish()
    }
}

use crate::core::{RecoverError, Result, split_node_id};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A byte stream to a cluster node.
pub trait NodeStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> NodeStream for T {}

pub type BoxedNodeStream = Box<dyn NodeStream>;

/// Opens raw streams to nodes.
///
/// The pool only talks to the network through this trait, so tests can plug in
/// an in-memory cluster.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    async fn connect(&self, node: &str) -> Result<BoxedNodeStream>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl NodeConnector for TcpConnector {
    async fn connect(&self, node: &str) -> Result<BoxedNodeStream> {
        let (host, port) = split_node_id(node)?;
        let connecting = TcpStream::connect((host, port));
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| {
                    RecoverError::connection(
                        node,
                        std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
                    )
                })?,
            None => connecting.await,
        }
        .map_err(|e| RecoverError::connection(node, e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| RecoverError::connection(node, e))?;
        Ok(Box::new(stream))
    }
}

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use vnode_recover::connection::transport::{BoxedNodeStream, NodeConnector};
use vnode_recover::protocol::{HEADER_LEN, VnodeRecord};
use vnode_recover::storage::{
    MemoryStorage, StorageBackend, StorageFactory, StorageFormat, StorageOptions,
};
use vnode_recover::{
    ConnectionConfig, ConnectionPool, NodeId, RecoverError, RoutingTable, VnodeId,
};

/// A vnode stream received by a fake node.
#[derive(Debug, Clone)]
pub struct ReceivedPush {
    pub node: NodeId,
    pub unit: String,
    pub vnode: VnodeId,
    pub records: Vec<VnodeRecord>,
}

#[derive(Default)]
struct NodeScript {
    handshake_reply: Option<String>,
    ack_reply: Option<String>,
    setroute_reply: Option<String>,
    history: Vec<String>,
    /// Command prefixes on which the node hangs up.
    hang_up_on: Vec<String>,
}

#[derive(Default)]
struct ClusterState {
    nodes: HashMap<NodeId, NodeScript>,
    down: HashSet<NodeId>,
    routing: Option<String>,
    commands: Vec<(NodeId, String)>,
    pushes: Vec<ReceivedPush>,
    connects: usize,
}

/// In-memory cluster of scripted nodes speaking the control protocol.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub fn new(nodes: &[&str]) -> Self {
        let cluster = Self::default();
        {
            let mut state = cluster.state.lock().unwrap();
            for node in nodes {
                state.nodes.insert(node.to_string(), NodeScript::default());
            }
        }
        cluster
    }

    fn script(&self, node: &str, f: impl FnOnce(&mut NodeScript)) {
        let mut state = self.state.lock().unwrap();
        f(state.nodes.entry(node.to_string()).or_default());
    }

    /// Every node answers `routingdump json` with `table`.
    pub fn with_routing(self, table: &RoutingTable) -> Self {
        self.state.lock().unwrap().routing = Some(serde_json::to_string(table).unwrap());
        self
    }

    pub fn with_history(self, node: &str, lines: &[&str]) -> Self {
        self.script(node, |s| s.history = lines.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn handshake_reply(self, node: &str, reply: &str) -> Self {
        self.script(node, |s| s.handshake_reply = Some(reply.to_string()));
        self
    }

    pub fn ack_reply(self, node: &str, reply: &str) -> Self {
        self.script(node, |s| s.ack_reply = Some(reply.to_string()));
        self
    }

    pub fn setroute_reply(self, node: &str, reply: &str) -> Self {
        self.script(node, |s| s.setroute_reply = Some(reply.to_string()));
        self
    }

    pub fn hang_up_on(self, node: &str, prefix: &str) -> Self {
        self.script(node, |s| s.hang_up_on.push(prefix.to_string()));
        self
    }

    /// Connections to `node` are refused.
    pub fn down(self, node: &str) -> Self {
        self.state.lock().unwrap().down.insert(node.to_string());
        self
    }

    pub fn pool(&self) -> ConnectionPool {
        ConnectionPool::new(ConnectionConfig::default(), Arc::new(self.clone())).unwrap()
    }

    /// Every command line received, in order.
    pub fn commands(&self) -> Vec<(NodeId, String)> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn commands_matching(&self, prefix: &str) -> Vec<(NodeId, String)> {
        self.commands()
            .into_iter()
            .filter(|(_, line)| line.starts_with(prefix))
            .collect()
    }

    pub fn pushes(&self) -> Vec<ReceivedPush> {
        self.state.lock().unwrap().pushes.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    fn record_command(&self, node: &str, line: &str) {
        self.state
            .lock()
            .unwrap()
            .commands
            .push((node.to_string(), line.to_string()));
    }

    fn hangs_up(&self, node: &str, line: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.nodes[node]
            .hang_up_on
            .iter()
            .any(|prefix| line.starts_with(prefix.as_str()))
    }

    /// Serves one connection until the client hangs up.
    async fn serve(self, node: NodeId, stream: DuplexStream) {
        let (read, mut write) = tokio::io::split(stream);
        let mut reader = BufReader::new(read);
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            self.record_command(&node, &line);
            if self.hangs_up(&node, &line) {
                return;
            }

            let reply = match line.split_whitespace().next().unwrap_or_default() {
                "routingdump" => {
                    let body = self.state.lock().unwrap().routing.clone();
                    match body {
                        Some(body) => format!("{}\r\nEND\r\n", body),
                        None => "END\r\n".to_string(),
                    }
                }
                "history_of_lost" => {
                    let state = self.state.lock().unwrap();
                    let mut reply = String::new();
                    for entry in &state.nodes[&node].history {
                        reply.push_str(entry);
                        reply.push_str("\r\n");
                    }
                    reply.push_str("END\r\n");
                    reply
                }
                "setroute" => {
                    let state = self.state.lock().unwrap();
                    let reply = state.nodes[&node].setroute_reply.clone();
                    format!("{}\r\n", reply.unwrap_or_else(|| "STORED".to_string()))
                }
                "spushv" | "pushv" => {
                    match self.receive_push(&node, &line, &mut reader, &mut write).await {
                        Some(reply) => reply,
                        None => return,
                    }
                }
                _ => "ERROR\r\n".to_string(),
            };
            if write.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }
    }

    /// Runs the handshake and reads a stream. Returns the final reply line.
    async fn receive_push<R, W>(
        &self,
        node: &str,
        line: &str,
        reader: &mut R,
        write: &mut W,
    ) -> Option<String>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        let mut parts = line.split_whitespace().skip(1);
        let unit = parts.next()?.to_string();
        let vnode: VnodeId = parts.next()?.parse().ok()?;

        let (handshake, ack) = {
            let state = self.state.lock().unwrap();
            let script = &state.nodes[node];
            (
                script.handshake_reply.clone().unwrap_or_else(|| "READY".to_string()),
                script.ack_reply.clone().unwrap_or_else(|| "STORED".to_string()),
            )
        };
        if handshake != "READY" {
            return Some(format!("{}\r\n", handshake));
        }
        write.write_all(b"READY\r\n").await.ok()?;

        let mut records = Vec::new();
        loop {
            let mut header = [0u8; HEADER_LEN];
            reader.read_exact(&mut header).await.ok()?;
            if header.iter().all(|b| *b == 0) {
                break;
            }
            let key_len = u32::from_be_bytes(header[16..20].try_into().unwrap()) as usize;
            let mut key = vec![0u8; key_len];
            reader.read_exact(&mut key).await.ok()?;
            let mut value_len = [0u8; 4];
            reader.read_exact(&mut value_len).await.ok()?;
            let mut value = vec![0u8; u32::from_be_bytes(value_len) as usize];
            reader.read_exact(&mut value).await.ok()?;

            let mut raw = header.to_vec();
            raw.extend_from_slice(&key);
            raw.extend_from_slice(&value_len);
            raw.extend_from_slice(&value);
            records.push(VnodeRecord::decode(&raw).ok()?);
        }

        self.state.lock().unwrap().pushes.push(ReceivedPush {
            node: node.to_string(),
            unit,
            vnode,
            records,
        });
        Some(format!("{}\r\n", ack))
    }
}

#[async_trait]
impl NodeConnector for FakeCluster {
    async fn connect(&self, node: &str) -> vnode_recover::Result<BoxedNodeStream> {
        {
            let mut state = self.state.lock().unwrap();
            if state.down.contains(node) || !state.nodes.contains_key(node) {
                return Err(RecoverError::connection(
                    node,
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
                ));
            }
            state.connects += 1;
        }

        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(self.clone().serve(node.to_string(), server));
        Ok(Box::new(client))
    }
}

/// Storage factory serving every unit from the same in-memory records.
#[derive(Clone, Default)]
pub struct MemoryStorageFactory {
    records: Arc<Mutex<BTreeMap<String, Vec<VnodeRecord>>>>,
    opened: Arc<Mutex<Vec<StorageOptions>>>,
}

impl MemoryStorageFactory {
    /// Records served for the unit stored at a directory named `unit`.
    pub fn with_unit(self, unit: &str, records: Vec<VnodeRecord>) -> Self {
        self.records.lock().unwrap().insert(unit.to_string(), records);
        self
    }

    pub fn opened(&self) -> Vec<StorageOptions> {
        self.opened.lock().unwrap().clone()
    }
}

impl StorageFactory for MemoryStorageFactory {
    fn create(&self, options: StorageOptions) -> vnode_recover::Result<Box<dyn StorageBackend>> {
        let unit = options
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let records = self
            .records
            .lock()
            .unwrap()
            .get(&unit)
            .cloned()
            .unwrap_or_default();
        let format = options.format;
        self.opened.lock().unwrap().push(options);
        Ok(Box::new(MemoryStorage::new(format).with_records(records)))
    }
}

pub fn record(vnode: VnodeId, key: &str, value: Option<&str>, clock: u32) -> VnodeRecord {
    VnodeRecord {
        vnode,
        last_update: 1_700_000_000,
        clock,
        expiry: 0,
        key: key.as_bytes().to_vec().into(),
        value: value.map(|v| v.as_bytes().to_vec().into()),
    }
}

/// Creates `<root>/<unit>/0.<ext>..` placeholder partition files.
pub fn make_unit(root: &std::path::Path, unit: &str, format: StorageFormat, partitions: usize) {
    let dir = root.join(unit);
    std::fs::create_dir_all(&dir).unwrap();
    for i in 0..partitions {
        std::fs::write(format.partition_file(&dir, i), b"").unwrap();
    }
}

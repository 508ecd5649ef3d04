use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use vnode_recover::{
    ConnectionConfig, LostSince, RecoveryConfig, RecoveryMode, core::node_id,
    protocol::DEFAULT_PUSH_COMMAND,
};

#[derive(Parser, Debug)]
#[command(name = "recoverlost")]
#[command(about = "Re-seeds lost vnodes of a cluster from a local storage snapshot")]
pub struct Cli {
    /// Address of the seed node
    pub address: String,

    /// Port of the seed node
    #[arg(value_parser = parse_port)]
    pub port: u16,

    /// Directory holding one subdirectory per shard unit
    pub storage_root: PathBuf,

    /// Also recover vnodes logged lost at or after this time
    #[arg(value_name = "YYYYMMDDHHMMSS", value_parser = parse_since)]
    pub since: Option<LostSince>,

    /// Treat every routed vnode as lost
    #[arg(long, conflicts_with = "since")]
    pub all_data: bool,

    /// Command opening a vnode stream on the target
    #[arg(long, default_value = DEFAULT_PUSH_COMMAND)]
    pub push_command: String,

    /// Average pause between streamed records, in microseconds
    #[arg(long, default_value_t = 100)]
    pub throttle_us: u64,

    /// Give up connecting to a node after this many milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,
}

impl Cli {
    pub fn recovery_config(&self) -> RecoveryConfig {
        let mode = if self.all_data {
            RecoveryMode::AllData
        } else {
            RecoveryMode::Lost {
                since: self.since.clone(),
            }
        };

        RecoveryConfig::new(node_id(&self.address, self.port), self.storage_root.clone())
            .mode(mode)
            .push_command(self.push_command.clone())
            .stream_throttle(Duration::from_micros(self.throttle_us))
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        let config = ConnectionConfig::default();
        match self.connect_timeout_ms {
            Some(ms) => config.connect_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}

fn parse_port(value: &str) -> Result<u16, String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err("port was not numeric.".to_string());
    }
    value
        .parse()
        .map_err(|_| format!("port '{}' is out of range", value))
}

fn parse_since(value: &str) -> Result<LostSince, String> {
    LostSince::parse(value).map_err(|_| "yyyymmddhhmmss format mismatch.".to_string())
}

mod cli;

use crate::cli::Cli;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vnode_recover::recover;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.recovery_config();
    let seed = config.seed.clone();
    let report = recover(config, cli.connection_config())
        .await
        .with_context(|| format!("recovery through seed node '{}' failed", seed))?;

    tracing::info!(%report, "done");
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use shardkv_bootstrap::{build_endpoint_table, program_cluster, ClusterConfig};
use shardkv_cli_common::LogArgs;
use shardkv_net::{AuthConfig, Server, ServerConfig};
use tokio_util::sync::CancellationToken;

/// Programs a cluster's shard topology from a config file, then serves
/// topology queries for clients to route against.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// Path to the cluster topology file (YAML or JSON).
    #[arg(long, env = "SHARDKV_CLUSTER_CONFIG")]
    config: PathBuf,
    /// Address to bind the bootstrap's own RPC listener to. Overrides the
    /// config file's `bootstrap.host` when given.
    #[arg(long, env = "SHARDKV_HOST")]
    host: Option<String>,
    /// Port to bind the bootstrap's own RPC listener to. Overrides the
    /// config file's `bootstrap.port` when given.
    #[arg(long, env = "SHARDKV_PORT")]
    port: Option<u16>,
    /// Shared secret presented to every shard's `change_role` before
    /// programming it. Must match each shard's own `--master-token`.
    #[arg(long, env = "SHARDKV_MASTER_TOKEN")]
    master_token: Option<String>,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    shardkv_cli_common::init_logging(&cli.log);

    let config = ClusterConfig::from_path(&cli.config).context("failed to load cluster config")?;
    tracing::info!(shards = config.shards.len(), "programming cluster topology");
    let master = Arc::new(
        program_cluster(&config, cli.master_token.as_deref())
            .await
            .context("failed to program cluster")?,
    );

    let table = build_endpoint_table(master);
    let server = Arc::new(Server::without_lock(table, AuthConfig::disabled()));

    let host = cli.host.unwrap_or_else(|| config.bootstrap.host.clone());
    let port = cli.port.unwrap_or(config.bootstrap.port);
    let addr = format!("{host}:{port}")
        .parse()
        .context("invalid --host/--port")?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c, shutting down");
        ctrl_c_token.cancel();
    });

    tracing::info!(%addr, "bootstrap service listening");
    server.serve(addr, ServerConfig::default(), cancel).await?;
    Ok(())
}

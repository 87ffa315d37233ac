use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shardkv_cli_common::LogArgs;
use shardkv_engine::ShardEngine;
use shardkv_net::{AuthConfig, Server, ServerConfig};
use shardkv_shard::{endpoint_table_and_lock, ShardState};
use shardkv_store::Store;
use tokio_util::sync::CancellationToken;

/// Serves a single hash-range bucket of the shared key/value space.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// Address to bind the shard's RPC listener to.
    #[arg(long, default_value = "127.0.0.1", env = "SHARDKV_HOST")]
    host: String,
    /// Port to bind the shard's RPC listener to.
    #[arg(long, default_value = "7000", env = "SHARDKV_PORT")]
    port: u16,
    /// This shard's byte budget. Writes that would exceed it are rejected.
    #[arg(long, default_value = "67108864", env = "SHARDKV_MAX_SIZE")]
    max_size: u64,
    /// Number of sub-buckets the distribution histogram tracks.
    #[arg(long, default_value = "10", env = "SHARDKV_BINS")]
    bins: u32,
    /// Lower bound (inclusive) of the hash range this shard owns at startup.
    #[arg(long, default_value = "0.0", env = "SHARDKV_START")]
    start: f64,
    /// Upper bound (exclusive) of the hash range this shard owns at startup.
    #[arg(long, default_value = "1.0", env = "SHARDKV_END")]
    end: f64,
    /// Optional human-readable name reported by `get_name`.
    #[arg(long, env = "SHARDKV_NAME")]
    name: Option<String>,
    /// If set, the store is loaded from and dumped to this file on
    /// startup/shutdown instead of staying purely in memory.
    #[arg(long, env = "SHARDKV_SNAPSHOT_PATH")]
    snapshot_path: Option<PathBuf>,
    /// Shared secret a connection must present to `change_role` in order to
    /// elevate itself into the `master` privilege group.
    #[arg(long, env = "SHARDKV_MASTER_TOKEN")]
    master_token: Option<String>,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    shardkv_cli_common::init_logging(&cli.log);

    let mut store = match cli.snapshot_path.clone() {
        Some(path) => Store::with_snapshot_path(path),
        None => Store::new(),
    };
    store.start().context("failed to load snapshot")?;

    let mut engine = ShardEngine::with_store(store, cli.start, cli.end, cli.max_size, cli.bins);
    engine.set_name(cli.name.clone());

    let state = ShardState::new(engine, cli.master_token);
    let (table, is_locked) = endpoint_table_and_lock(state.clone());
    let server = std::sync::Arc::new(Server::new(table, AuthConfig::disabled(), is_locked));

    let addr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .context("invalid --host/--port")?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c, shutting down");
        ctrl_c_token.cancel();
    });

    tracing::info!(%addr, start = cli.start, end = cli.end, "shard listening");
    server.serve(addr, ServerConfig::default(), cancel).await?;

    state
        .snapshot_on_shutdown()
        .await
        .context("failed to write snapshot")?;
    Ok(())
}

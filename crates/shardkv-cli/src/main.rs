use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::net::SocketAddr;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shardkv_bucket::hashing::{BucketHasher, Md5Hasher};
use shardkv_bucket::partition_point_for;
use shardkv_cli_common::LogArgs;
use shardkv_client::{MasterClient, ShardClient};
use shardkv_store::Key;

/// Thin external front end: `write`/`cat` a single index through whatever
/// shard currently owns each key, routed via the bootstrap's `get_map`.
/// Grounded on spec.md §6's CLI contract — deliberately shallow, same as
/// the source's own `cli.py` script wrapping `ClientBase`.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// Address of the bootstrap service to resolve shard ownership from.
    #[arg(long, default_value = "127.0.0.1:6999", env = "SHARDKV_BOOTSTRAP_ADDR")]
    bootstrap: SocketAddr,

    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    log: LogArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reads `key|value` lines from standard input and bulk-inserts them.
    Write {
        index: String,
        /// Auto-create the index on any shard that doesn't have it yet,
        /// warning (rather than failing) if it already exists there.
        #[arg(long)]
        force: bool,
    },
    /// Streams every `key|JSON(record)` pair in `index` to standard output.
    Cat { index: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    shardkv_cli_common::init_logging(&cli.log);

    let master = MasterClient::connect(cli.bootstrap)
        .await
        .context("failed to connect to the bootstrap service")?;
    let mut router = ShardRouter::new(master).await?;

    match cli.command {
        Command::Write { index, force } => run_write(&mut router, &index, force).await,
        Command::Cat { index } => run_cat(&mut router, &index).await,
    }
}

/// Caches one [`ShardClient`] connection per shard address, resolving the
/// owner of a key locally from a `get_map` snapshot taken once at startup
/// (matching spec.md §6's "resolve once, connect directly" data flow; a
/// topology change after that snapshot is not picked up mid-run).
struct ShardRouter {
    bucket_starts: Vec<f64>,
    addrs: Vec<SocketAddr>,
    clients: HashMap<SocketAddr, ShardClient>,
}

impl ShardRouter {
    async fn new(master: MasterClient) -> anyhow::Result<Self> {
        let entries = master.get_map().await.context("failed to resolve cluster topology")?;
        if entries.is_empty() {
            bail!("bootstrap reports an empty cluster topology");
        }
        let bucket_starts = entries.iter().map(|(start, _)| *start).collect();
        let addrs = entries.into_iter().map(|(_, addr)| addr).collect();
        Ok(ShardRouter {
            bucket_starts,
            addrs,
            clients: HashMap::new(),
        })
    }

    fn owner_addr(&self, index: &str, key: &Key) -> (f64, SocketAddr) {
        let hash = Md5Hasher.point(index, key);
        let owner = self.addrs[partition_point_for(&self.bucket_starts, hash)];
        (hash, owner)
    }

    async fn client_for(&mut self, addr: SocketAddr) -> anyhow::Result<ShardClient> {
        if let Some(client) = self.clients.get(&addr) {
            return Ok(client.clone());
        }
        let client = ShardClient::connect(addr)
            .await
            .with_context(|| format!("failed to connect to shard {addr}"))?;
        self.clients.insert(addr, client.clone());
        Ok(client)
    }

    fn all_addrs(&self) -> Vec<SocketAddr> {
        self.addrs.clone()
    }
}

/// Parses a `key|value` line. The key is interpreted as JSON when that
/// parses to a scalar (so `1|...` is an integer key), and as a bare string
/// otherwise; the value is parsed the same way, falling back to a JSON
/// string when it isn't valid JSON on its own.
fn parse_write_line(line: &str) -> anyhow::Result<(Key, Value)> {
    let (key_part, value_part) = line
        .split_once('|')
        .ok_or_else(|| anyhow::anyhow!("expected `key|value`, got {line:?}"))?;
    let key = parse_key(key_part);
    let value = serde_json::from_str(value_part).unwrap_or_else(|_| Value::String(value_part.to_string()));
    Ok((key, value))
}

fn parse_key(raw: &str) -> Key {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| Key::from_value(&v))
        .unwrap_or_else(|| Key::Str(raw.to_string()))
}

async fn run_write(router: &mut ShardRouter, index: &str, force: bool) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut created = std::collections::HashSet::new();

    for line in stdin.lock().lines() {
        let line = line.context("failed to read from standard input")?;
        if line.is_empty() {
            continue;
        }
        let (key, value) = parse_write_line(&line)?;
        let (hash, addr) = router.owner_addr(index, &key);
        let client = router.client_for(addr).await?;

        if force && created.insert(addr) {
            if let Err(err) = client.create_index(index).await {
                tracing::warn!(%addr, index, "create_index: {err}");
            }
        }

        client
            .write(index, &key, hash, value)
            .await
            .with_context(|| format!("write to shard {addr} failed"))?;
    }
    Ok(())
}

async fn run_cat(router: &mut ShardRouter, index: &str) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for addr in router.all_addrs() {
        let client = router.client_for(addr).await?;
        let keys = client
            .keys(index)
            .await
            .with_context(|| format!("keys() on shard {addr} failed"))?;
        for raw_key in keys {
            let Some(key) = Key::from_value(&raw_key) else {
                continue;
            };
            let Some(record) = client.read(index, &key).await? else {
                continue;
            };
            writeln!(out, "{}|{}", key, serde_json::to_string(&record)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys_parse_as_numbers() {
        let (key, value) = parse_write_line("42|\"red\"").unwrap();
        assert!(matches!(key, Key::Int(42)));
        assert_eq!(value, Value::String("red".to_string()));
    }

    #[test]
    fn non_numeric_keys_stay_strings() {
        let (key, _) = parse_write_line("a|1").unwrap();
        assert!(matches!(key, Key::Str(ref s) if s == "a"));
    }

    #[test]
    fn object_values_parse_as_json() {
        let (_, value) = parse_write_line(r#"a|{"color":"red"}"#).unwrap();
        assert_eq!(value, serde_json::json!({"color": "red"}));
    }

    #[test]
    fn bare_word_values_fall_back_to_a_json_string() {
        let (_, value) = parse_write_line("a|red").unwrap();
        assert_eq!(value, Value::String("red".to_string()));
    }

    #[test]
    fn a_line_without_a_separator_is_rejected() {
        assert!(parse_write_line("no-separator-here").is_err());
    }
}

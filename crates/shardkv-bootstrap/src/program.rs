use std::net::SocketAddr;

use shardkv_bucket::master::{validate_bucket_starts, BucketEntry};
use shardkv_bucket::Master;
use shardkv_client::ShardClient;

use crate::config::{ClusterConfig, ShardSpec};
use crate::error::BootstrapError;
use crate::guard::UnlockGuard;

/// Programs every shard named in `config` with its hash range and byte
/// budget, then returns a [`Master`] ready to serve topology queries.
/// Grounded on the shard startup sequence: connect, acquire the `master`
/// role (with `master_token` if the shard requires one), lock, program its
/// range, release every shard, with a guaranteed release even if
/// programming fails partway through.
pub async fn program_cluster(
    config: &ClusterConfig,
    master_token: Option<&str>,
) -> Result<Master, BootstrapError> {
    let mut guard = UnlockGuard::new();
    let mut programmed = Vec::with_capacity(config.shards.len());

    for spec in &config.shards {
        let addr = resolve_addr(spec)?;
        let client = ShardClient::connect(addr).await?;
        client.change_role("master", master_token).await?;
        client.lock_shard().await?;
        guard.track(client.clone());
        client.set_start(spec.start).await?;
        client.set_maxsize(spec.max_size).await?;
        if let Some(name) = &spec.name {
            client.set_name(name).await?;
        }
        programmed.push((spec.clone(), addr, client));
    }

    programmed.sort_by(|a, b| a.0.start.total_cmp(&b.0.start));
    let starts: Vec<f64> = programmed.iter().map(|(spec, _, _)| spec.start).collect();
    let names: Vec<Option<String>> = programmed.iter().map(|(spec, _, _)| spec.name.clone()).collect();
    validate_bucket_starts(&starts, &names)?;

    for (i, (_spec, _addr, client)) in programmed.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(1.0);
        client.set_end(end).await?;
        client.update_distr().await?;
    }

    let locked_clients = guard.disarm();
    let mut first_release_error = None;
    for client in &locked_clients {
        if let Err(err) = client.release_shard().await {
            tracing::warn!("failed to release shard {}: {err}", client.peer_addr());
            first_release_error.get_or_insert(err);
        }
    }
    if let Some(err) = first_release_error {
        return Err(err.into());
    }

    let entries = programmed
        .into_iter()
        .map(|(spec, addr, client)| BucketEntry {
            start: spec.start,
            name: spec.name,
            addr,
            client,
        })
        .collect();
    Master::new(entries).map_err(Into::into)
}

fn resolve_addr(spec: &ShardSpec) -> Result<SocketAddr, BootstrapError> {
    format!("{}:{}", spec.host, spec.port)
        .parse()
        .map_err(|_| BootstrapError::InvalidAddress(format!("{}:{}", spec.host, spec.port)))
}

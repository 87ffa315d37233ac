use shardkv_client::ShardClient;

/// Tracks shards locked so far during cluster programming and releases any
/// that are still locked if the caller drops the guard without disarming
/// it — `spec.md` §4.8's "must always release on all shards even if
/// programming one fails," the idiomatic equivalent of the source's
/// `contextlib.contextmanager` `try/finally`. `Drop` can't `.await`, so an
/// early failure spawns the release calls onto the current runtime instead
/// of blocking the unwind.
pub struct UnlockGuard {
    locked: Vec<ShardClient>,
}

impl UnlockGuard {
    pub fn new() -> Self {
        UnlockGuard { locked: Vec::new() }
    }

    pub fn track(&mut self, client: ShardClient) {
        self.locked.push(client);
    }

    /// Disarms the guard, handing back every tracked client so the caller
    /// can release them on the normal success path instead of via `Drop`.
    pub fn disarm(mut self) -> Vec<ShardClient> {
        std::mem::take(&mut self.locked)
    }
}

impl Default for UnlockGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UnlockGuard {
    fn drop(&mut self) {
        if self.locked.is_empty() {
            return;
        }
        let clients = std::mem::take(&mut self.locked);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for client in clients {
                        if let Err(err) = client.release_shard().await {
                            tracing::warn!("failed to release shard during cleanup: {err}");
                        }
                    }
                });
            }
            Err(_) => {
                tracing::warn!("no tokio runtime available to release {} locked shard(s)", clients.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use shardkv_engine::ShardEngine;
    use shardkv_net::{AuthConfig, Server, ServerConfig};
    use shardkv_shard::{endpoint_table_and_lock, ShardState};
    use tokio_util::sync::CancellationToken;

    use super::*;

    async fn spin_up_shard() -> (
        std::net::SocketAddr,
        Arc<ShardState>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let engine = ShardEngine::new(0.0, 1.0, 1024 * 1024, 10);
        let state = ShardState::new(engine, None);
        let (table, is_locked) = endpoint_table_and_lock(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::new(table, AuthConfig::disabled(), is_locked));
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            server.serve_on(listener, ServerConfig::default(), cancel_clone).await.unwrap();
        });
        (addr, state, cancel, handle)
    }

    #[tokio::test]
    async fn disarm_hands_back_every_tracked_client() {
        let (addr, _state, cancel, handle) = spin_up_shard().await;
        let client = ShardClient::connect(addr).await.unwrap();
        client.lock_shard().await.unwrap();

        let mut guard = UnlockGuard::new();
        guard.track(client.clone());
        let handed_back = guard.disarm();
        assert_eq!(handed_back.len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_without_disarming_releases_every_tracked_shard() {
        let (addr, state, cancel, handle) = spin_up_shard().await;
        let client = ShardClient::connect(addr).await.unwrap();
        client.lock_shard().await.unwrap();
        assert!(state.is_locked());

        {
            let mut guard = UnlockGuard::new();
            guard.track(client.clone());
            // guard drops here without disarm(), spawning a background release.
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while state.is_locked() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!state.is_locked(), "guard drop should have released the shard");

        cancel.cancel();
        handle.await.unwrap();
    }
}

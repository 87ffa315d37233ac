use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Map, Value};
use shardkv_proto::{RequestEnvelope, ResponseEnvelope};
use shardkv_wire::{read_frame_async, DEFAULT_MAX_FRAME_LEN};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::auth::AuthConfig;
use crate::channel::Channel;
use crate::endpoint::EndpointTable;

/// Queue capacities: the default queue gets `B`, the master queue `B/2`,
/// exactly `spec.md` §4.5/§5.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub default_queue_capacity: usize,
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            default_queue_capacity: 64,
            backlog: 5,
        }
    }
}

type QueueItem = (Arc<Channel>, String, Vec<Value>, Map<String, Value>);

/// The reusable dispatcher core. One instance is built per process (shard
/// or bootstrap), wired with that process's [`EndpointTable`] and an
/// `is_locked` predicate (the shard service wires this to its lock state
/// machine; the bootstrap service always passes `false`, since it has no
/// lock concept of its own).
pub struct Server {
    endpoints: EndpointTable,
    auth: AuthConfig,
    processing_mutex: Mutex<()>,
    is_locked: Box<dyn Fn() -> bool + Send + Sync>,
}

impl Server {
    pub fn new(
        endpoints: EndpointTable,
        auth: AuthConfig,
        is_locked: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Server {
            endpoints,
            auth,
            processing_mutex: Mutex::new(()),
            is_locked: Box::new(is_locked),
        }
    }

    pub fn without_lock(endpoints: EndpointTable, auth: AuthConfig) -> Self {
        Self::new(endpoints, auth, || false)
    }

    /// Binds and serves until `cancel` fires; drains in-flight queue items
    /// before returning (best-effort graceful shutdown per `spec.md` §5).
    pub async fn serve(
        self: Arc<Self>,
        addr: SocketAddr,
        config: ServerConfig,
        cancel: CancellationToken,
    ) -> std::io::Result<()> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.backlog)?;
        self.serve_on(listener, config, cancel).await
    }

    pub async fn serve_on(
        self: Arc<Self>,
        listener: TcpListener,
        config: ServerConfig,
        cancel: CancellationToken,
    ) -> std::io::Result<()> {
        let (master_tx, master_rx) = mpsc::channel::<QueueItem>(config.default_queue_capacity / 2 + 1);
        let (default_tx, default_rx) = mpsc::channel::<QueueItem>(config.default_queue_capacity);

        let master_worker = tokio::spawn(Self::worker(self.clone(), master_rx));
        let default_worker = tokio::spawn(Self::worker(self.clone(), default_rx));

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let server = self.clone();
                            let master_tx = master_tx.clone();
                            let default_tx = default_tx.clone();
                            tokio::spawn(async move {
                                server.handle_connection(stream, peer_addr, master_tx, default_tx).await;
                            });
                        }
                        Err(err) => {
                            tracing::warn!("accept failed: {err}");
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("listener shutting down, draining queues");
                    break;
                }
            }
        }

        drop(master_tx);
        drop(default_tx);
        let _ = master_worker.await;
        let _ = default_worker.await;
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
        master_tx: mpsc::Sender<QueueItem>,
        default_tx: mpsc::Sender<QueueItem>,
    ) {
        let (mut read_half, write_half) = stream.into_split();
        let channel = Arc::new(Channel::new(peer_addr, write_half));

        if self.auth.enabled {
            let result = tokio::time::timeout(
                self.auth.auth_timeout,
                read_frame_async(&mut read_half, DEFAULT_MAX_FRAME_LEN),
            )
            .await;
            match result {
                Ok(Ok(bytes)) => {
                    let token = String::from_utf8_lossy(&bytes).into_owned();
                    match self.auth.resolve(&token) {
                        Some(info) => {
                            channel.set_token(token);
                            channel.set_permission_group(info.group.clone());
                        }
                        None => {
                            tracing::warn!(%peer_addr, "unknown bearer token, closing connection");
                            return;
                        }
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(%peer_addr, "failed to read auth token: {err}");
                    return;
                }
                Err(_) => {
                    tracing::warn!(%peer_addr, "timed out waiting for auth token");
                    return;
                }
            }
        }

        tracing::debug!(%peer_addr, "connection accepted");

        loop {
            let bytes = match read_frame_async(&mut read_half, DEFAULT_MAX_FRAME_LEN).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(%peer_addr, "connection closed: {err}");
                    break;
                }
            };

            let request = match RequestEnvelope::decode(&bytes) {
                Ok(req) => req,
                Err(err) => {
                    tracing::warn!(%peer_addr, "couldn't parse request: {err}");
                    break;
                }
            };

            let item = (channel.clone(), request.endpoint, request.args, request.kwargs);
            let queue = if channel.is_master() { &master_tx } else { &default_tx };
            if queue.send(item).await.is_err() {
                tracing::warn!(%peer_addr, "dispatcher shut down mid-request");
                break;
            }
        }
    }

    async fn worker(self: Arc<Self>, mut queue: mpsc::Receiver<QueueItem>) {
        while let Some((channel, endpoint, args, kwargs)) = queue.recv().await {
            let response = self.dispatch_and_execute(&channel, &endpoint, args, kwargs).await;
            let envelope = match response {
                Ok(message) => ResponseEnvelope::success(message),
                Err(err) => ResponseEnvelope::error(err.as_message()),
            };
            if let Err(err) = channel.write_frame(&envelope.encode()).await {
                tracing::warn!(peer_addr = %channel.peer_addr(), "failed to write response: {err}");
            }
        }
    }

    async fn dispatch_and_execute(
        &self,
        channel: &Arc<Channel>,
        endpoint: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, crate::ServiceError> {
        if !self.endpoints.contains(endpoint) {
            return Err(crate::ServiceError::UnknownEndpoint(endpoint.to_string()));
        }
        if !self.endpoints.is_permitted(endpoint, channel.permission_group().as_deref()) {
            return Err(crate::ServiceError::PermissionDenied);
        }
        let _guard = self.processing_mutex.lock().await;
        if self.endpoints.requires_unlocked(endpoint) && (self.is_locked)() {
            return Err(crate::ServiceError::ShardLocked);
        }
        self.endpoints
            .dispatch(endpoint, channel.clone(), args, kwargs)
            .await
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Map, Value};
use shardkv_proto::{RequestEnvelope, ResponseEnvelope};
use shardkv_wire::{read_frame_async, write_frame_async, DEFAULT_MAX_FRAME_LEN};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::ClientError;

/// A single TCP connection to a peer (shard, master, or bootstrap),
/// shared behind an `Arc` so a `ShardClient`/`MasterClient`/`BootstrapClient`
/// handle can be cheaply cloned. The inner `Mutex` enforces the source's
/// "one connection equals one request-in-flight" invariant without
/// requiring external callers to serialize calls by convention.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Mutex<TcpStream>>,
    peer_addr: SocketAddr,
}

impl Connection {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(shardkv_wire::FrameError::Io)?;
        Ok(Connection {
            inner: Arc::new(Mutex::new(stream)),
            peer_addr: addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Sends a bearer token as the first framed message on a fresh
    /// connection, per the authentication handshake in `spec.md` §4.5.
    pub async fn authenticate(&self, token: &str) -> Result<(), ClientError> {
        let mut stream = self.inner.lock().await;
        write_frame_async(&mut *stream, token.as_bytes()).await?;
        Ok(())
    }

    /// Builds a request envelope, sends it, and reads back the decoded
    /// response payload, raising [`ClientError::Remote`] on `type: "error"`.
    pub async fn call(
        &self,
        endpoint: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, ClientError> {
        let request = RequestEnvelope::new(endpoint).with_args(args).with_kwargs(kwargs);

        let mut stream = self.inner.lock().await;
        write_frame_async(&mut *stream, &request.encode()).await?;
        let bytes = read_frame_async(&mut *stream, DEFAULT_MAX_FRAME_LEN).await?;
        drop(stream);

        let response = ResponseEnvelope::decode(&bytes)?;
        response.into_result().map_err(ClientError::Remote)
    }
}

use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// Per-connection state: peer address, post-authentication token and
/// privilege group, and the owned write half (behind a mutex so a worker
/// finishing a handler can write the response without racing a concurrent
/// teardown). Grounded on `pyshard/core/server.py`'s `_Channel`.
pub struct Channel {
    peer_addr: SocketAddr,
    token: StdMutex<Option<String>>,
    permission_group: StdMutex<Option<String>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl Channel {
    pub fn new(peer_addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Channel {
            peer_addr,
            token: StdMutex::new(None),
            permission_group: StdMutex::new(None),
            writer: Mutex::new(writer),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    pub fn set_token(&self, token: String) {
        *self.token.lock().unwrap() = Some(token);
    }

    pub fn permission_group(&self) -> Option<String> {
        self.permission_group.lock().unwrap().clone()
    }

    pub fn set_permission_group(&self, group: impl Into<String>) {
        *self.permission_group.lock().unwrap() = Some(group.into());
    }

    pub fn is_master(&self) -> bool {
        self.permission_group().as_deref() == Some(crate::MASTER_GROUP)
    }

    pub async fn write_frame(&self, payload: &[u8]) -> Result<(), shardkv_wire::FrameError> {
        let mut writer = self.writer.lock().await;
        shardkv_wire::write_frame_async(&mut *writer, payload).await
    }
}

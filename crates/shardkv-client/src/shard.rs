use std::net::SocketAddr;

use serde_json::{json, Map, Value};
use shardkv_store::{Key, Record};

use crate::connection::Connection;
use crate::error::ClientError;

/// RPC stub for every endpoint `shardkv-shard` serves. Grounded on
/// `pyshard/shard/client.py`'s `ShardClient`; also used as the single
/// outbound pipe a shard opens to a peer during relocation.
#[derive(Clone)]
pub struct ShardClient {
    conn: Connection,
}

fn key_to_value(key: &Key) -> Value {
    match key {
        Key::Int(i) => json!(i),
        Key::Float(f) => json!(f),
        Key::Str(s) => json!(s),
    }
}

fn record_from_message(message: Value) -> Result<Option<Record>, ClientError> {
    if message.is_null() {
        return Ok(None);
    }
    serde_json::from_value(message)
        .map(Some)
        .map_err(|e| ClientError::Remote(json!(e.to_string())))
}

impl ShardClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Ok(ShardClient {
            conn: Connection::connect(addr).await?,
        })
    }

    pub async fn authenticate(&self, token: &str) -> Result<(), ClientError> {
        self.conn.authenticate(token).await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.conn.peer_addr()
    }

    pub async fn write(&self, index: &str, key: &Key, hash: f64, doc: Value) -> Result<u64, ClientError> {
        let mut kwargs = Map::new();
        kwargs.insert("hash_".to_string(), json!(hash));
        kwargs.insert("record".to_string(), doc);
        let args = vec![json!(index), key_to_value(key)];
        let message = self.conn.call("write", args, kwargs).await?;
        Ok(message.as_u64().unwrap_or(0))
    }

    pub async fn read(&self, index: &str, key: &Key) -> Result<Option<Record>, ClientError> {
        let args = vec![json!(index), key_to_value(key)];
        let message = self.conn.call("read", args, Map::new()).await?;
        record_from_message(message)
    }

    pub async fn pop(&self, index: &str, key: &Key) -> Result<Option<Record>, ClientError> {
        let args = vec![json!(index), key_to_value(key)];
        let message = self.conn.call("pop", args, Map::new()).await?;
        record_from_message(message)
    }

    pub async fn remove(&self, index: &str, key: &Key) -> Result<u64, ClientError> {
        let args = vec![json!(index), key_to_value(key)];
        let message = self.conn.call("remove", args, Map::new()).await?;
        Ok(message.as_u64().unwrap_or(0))
    }

    pub async fn create_index(&self, index: &str) -> Result<(), ClientError> {
        self.conn.call("create_index", vec![json!(index)], Map::new()).await?;
        Ok(())
    }

    pub async fn drop_index(&self, index: &str) -> Result<(), ClientError> {
        self.conn.call("drop_index", vec![json!(index)], Map::new()).await?;
        Ok(())
    }

    pub async fn keys(&self, index: &str) -> Result<Vec<Value>, ClientError> {
        let message = self.conn.call("keys", vec![json!(index)], Map::new()).await?;
        Ok(message.as_array().cloned().unwrap_or_default())
    }

    pub async fn get_stat(&self) -> Result<Value, ClientError> {
        self.conn.call("get_stat", Vec::new(), Map::new()).await
    }

    pub async fn get_name(&self) -> Result<Value, ClientError> {
        self.conn.call("get_name", Vec::new(), Map::new()).await
    }

    pub async fn lock_shard(&self) -> Result<(), ClientError> {
        self.conn.call("lock_shard", Vec::new(), Map::new()).await?;
        Ok(())
    }

    pub async fn release_shard(&self) -> Result<(), ClientError> {
        self.conn.call("release_shard", Vec::new(), Map::new()).await?;
        Ok(())
    }

    pub async fn change_role(&self, role: &str, token: Option<&str>) -> Result<(), ClientError> {
        let mut kwargs = Map::new();
        kwargs.insert("token".to_string(), json!(token));
        self.conn
            .call("change_role", vec![json!(role)], kwargs)
            .await?;
        Ok(())
    }

    pub async fn set_start(&self, value: f64) -> Result<(), ClientError> {
        self.conn.call("set_start", vec![json!(value)], Map::new()).await?;
        Ok(())
    }

    pub async fn set_end(&self, value: f64) -> Result<(), ClientError> {
        self.conn.call("set_end", vec![json!(value)], Map::new()).await?;
        Ok(())
    }

    pub async fn set_maxsize(&self, value: u64) -> Result<(), ClientError> {
        self.conn.call("set_maxsize", vec![json!(value)], Map::new()).await?;
        Ok(())
    }

    pub async fn set_name(&self, name: &str) -> Result<(), ClientError> {
        self.conn.call("set_name", vec![json!(name)], Map::new()).await?;
        Ok(())
    }

    pub async fn update_distr(&self) -> Result<(), ClientError> {
        self.conn.call("update_distr", Vec::new(), Map::new()).await?;
        Ok(())
    }

    pub async fn open_pipe(&self, addr: SocketAddr) -> Result<(), ClientError> {
        let args = vec![json!(addr.ip().to_string()), json!(addr.port())];
        self.conn.call("open_pipe", args, Map::new()).await?;
        Ok(())
    }

    pub async fn close_pipe(&self) -> Result<(), ClientError> {
        self.conn.call("close_pipe", Vec::new(), Map::new()).await?;
        Ok(())
    }

    pub async fn reloc(&self, index: &str, key: &Key, addr: SocketAddr) -> Result<u64, ClientError> {
        let args = vec![
            json!(index),
            key_to_value(key),
            json!([addr.ip().to_string(), addr.port()]),
        ];
        let message = self.conn.call("reloc", args, Map::new()).await?;
        Ok(message.as_u64().unwrap_or(0))
    }
}

#[async_trait::async_trait]
impl shardkv_engine::RelocPipe for ShardClient {
    type Error = ClientError;

    async fn pop(&self, index: &str, key: &Key) -> Result<Option<Record>, Self::Error> {
        ShardClient::pop(self, index, key).await
    }
}

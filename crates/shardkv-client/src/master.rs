use std::net::SocketAddr;

use serde_json::{json, Map, Value};
use shardkv_store::Key;

use crate::connection::Connection;
use crate::error::ClientError;
use crate::shard::ShardClient;

/// RPC stub for the bootstrap's topology-serving endpoints, grounded on
/// `pyshard/master/client.py`'s `MasterClient`.
#[derive(Clone)]
pub struct MasterClient {
    conn: Connection,
}

fn key_to_value(key: &Key) -> Value {
    match key {
        Key::Int(i) => json!(i),
        Key::Float(f) => json!(f),
        Key::Str(s) => json!(s),
    }
}

impl MasterClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Ok(MasterClient {
            conn: Connection::connect(addr).await?,
        })
    }

    pub async fn authenticate(&self, token: &str) -> Result<(), ClientError> {
        self.conn.authenticate(token).await
    }

    /// Resolves `(index, key)` to `(hash, shard_addr)`. Callers dial the
    /// returned address with [`ShardClient::connect`] to talk to the owner
    /// directly, matching the source's "resolve once, connect directly"
    /// topology model.
    pub async fn get_shard(&self, index: &str, key: &Key) -> Result<(f64, SocketAddr), ClientError> {
        let args = vec![json!(index), key_to_value(key)];
        let message = self.conn.call("get_shard", args, Map::new()).await?;
        let hash = message
            .get(0)
            .and_then(Value::as_f64)
            .ok_or_else(|| ClientError::Remote(json!("get_shard: missing hash in response")))?;
        let addr_str = message
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Remote(json!("get_shard: missing addr in response")))?;
        let addr = addr_str
            .parse()
            .map_err(|_| ClientError::Remote(json!(format!("get_shard: invalid addr {addr_str:?}"))))?;
        Ok((hash, addr))
    }

    pub async fn get_map(&self) -> Result<Vec<(f64, SocketAddr)>, ClientError> {
        let message = self.conn.call("get_map", Vec::new(), Map::new()).await?;
        let map = message
            .as_object()
            .ok_or_else(|| ClientError::Remote(json!("get_map: expected an object")))?;
        let mut entries = Vec::with_capacity(map.len());
        for (bucket_start, addr_value) in map {
            let start: f64 = bucket_start
                .parse()
                .map_err(|_| ClientError::Remote(json!(format!("get_map: bad bucket {bucket_start:?}"))))?;
            let addr_str = addr_value
                .as_str()
                .ok_or_else(|| ClientError::Remote(json!("get_map: expected a string address")))?;
            let addr = addr_str
                .parse()
                .map_err(|_| ClientError::Remote(json!(format!("get_map: invalid addr {addr_str:?}"))))?;
            entries.push((start, addr));
        }
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(entries)
    }

    pub async fn stat(&self) -> Result<Value, ClientError> {
        self.conn.call("stat", Vec::new(), Map::new()).await
    }

    pub async fn create_index(&self, index: &str) -> Result<(), ClientError> {
        self.conn.call("create_index", vec![json!(index)], Map::new()).await?;
        Ok(())
    }

    pub async fn drop_index(&self, index: &str) -> Result<(), ClientError> {
        self.conn.call("drop_index", vec![json!(index)], Map::new()).await?;
        Ok(())
    }

    /// Convenience wrapper combining `get_shard` with dialing the owner.
    pub async fn dial_shard_for(&self, index: &str, key: &Key) -> Result<(f64, ShardClient), ClientError> {
        let (hash, addr) = self.get_shard(index, key).await?;
        let shard = ShardClient::connect(addr).await?;
        Ok((hash, shard))
    }
}

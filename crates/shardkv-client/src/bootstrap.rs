use std::net::SocketAddr;

use serde_json::{json, Map, Value};

use crate::connection::Connection;
use crate::error::ClientError;

/// RPC stub for the bootstrap's own administrative surface, used by the
/// bootstrap process itself when programming shards (`lock_shard`,
/// `set_start`, ... are actually invoked against each shard directly via
/// [`crate::ShardClient`]; this client is the thin stub bootstrap clients
/// of the *bootstrap service* use, mirroring `pyshard/master/client.py`'s
/// split between talking to a shard versus talking to the master).
#[derive(Clone)]
pub struct BootstrapClient {
    conn: Connection,
}

impl BootstrapClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Ok(BootstrapClient {
            conn: Connection::connect(addr).await?,
        })
    }

    pub async fn get_map(&self) -> Result<Value, ClientError> {
        self.conn.call("get_map", Vec::new(), Map::new()).await
    }

    pub async fn get_shard(&self, index: &str, key: Value) -> Result<Value, ClientError> {
        self.conn.call("get_shard", vec![json!(index), key], Map::new()).await
    }

    pub async fn create_index(&self, index: &str) -> Result<(), ClientError> {
        self.conn.call("create_index", vec![json!(index)], Map::new()).await?;
        Ok(())
    }

    pub async fn drop_index(&self, index: &str) -> Result<(), ClientError> {
        self.conn.call("drop_index", vec![json!(index)], Map::new()).await?;
        Ok(())
    }

    pub async fn stat(&self) -> Result<Value, ClientError> {
        self.conn.call("stat", Vec::new(), Map::new()).await
    }
}

//! The reusable async connection dispatcher shared by `shardkv-shard` and
//! `shardkv-bootstrap`: accept loop, per-connection authentication,
//! priority queues, and a shard-wide processing mutex serializing handler
//! execution. Grounded structurally on `pyshard/core/server.py`'s
//! `ServerBase`, built the way `crates/dekaf/src/main.rs` builds a tokio
//! accept loop rather than `asyncio` coroutines.

pub mod auth;
pub mod channel;
pub mod endpoint;
pub mod error;
pub mod server;

pub use auth::{AuthConfig, TokenInfo};
pub use channel::Channel;
pub use endpoint::{EndpointTable, Handler};
pub use error::ServiceError;
pub use server::{Server, ServerConfig};

/// Privilege class reserved for administrative endpoints, matching the
/// source's `_master_group = 'master'`.
pub const MASTER_GROUP: &str = "master";

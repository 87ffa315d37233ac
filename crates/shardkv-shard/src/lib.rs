//! Binds `shardkv-engine`'s `ShardEngine` to the `shardkv-net` dispatcher:
//! the full endpoint table a shard process serves, its `Open`/`Locked`
//! state machine, and the single optional outbound relocation pipe.
//! Grounded on `pyshard/shard/server.py`'s `ShardServer`.

pub mod error;
pub mod service;

pub use service::{build_endpoint_table, endpoint_table_and_lock, ShardState};

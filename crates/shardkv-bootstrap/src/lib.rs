//! The cluster bootstrap service: reads a static topology file, programs
//! every shard's hash range over the network, and then serves topology
//! queries (`get_map`/`get_shard`/`create_index`/`drop_index`/`stat`) from
//! an in-process [`shardkv_bucket::Master`]. Grounded on
//! `pyshard/master/master.py`'s `BootstrapServer`.

pub mod config;
pub mod error;
pub mod guard;
pub mod program;
pub mod service;

pub use config::{BootstrapSpec, ClusterConfig, ShardSpec};
pub use error::BootstrapError;
pub use guard::UnlockGuard;
pub use program::program_cluster;
pub use service::build_endpoint_table;

//! Shared `clap`/`tracing` wiring reused by the `shardkv-shard` and
//! `shardkv-bootstrap` binaries, adapted directly from the corpus's own
//! `flow_cli_common::logging` module.

pub mod logging;

pub use logging::{init_logging, LogArgs, LogFormat, LogLevel};

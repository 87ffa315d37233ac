//! The self-describing request/response envelope every shardkv endpoint
//! speaks, encoded as JSON over `shardkv-wire`'s framing.

pub mod envelope;

pub use envelope::{ProtoError, RequestEnvelope, ResponseEnvelope};

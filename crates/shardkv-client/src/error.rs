use shardkv_proto::ProtoError;
use shardkv_wire::FrameError;

/// Failure invoking a remote endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error("remote endpoint returned an error: {0}")]
    Remote(serde_json::Value),
}

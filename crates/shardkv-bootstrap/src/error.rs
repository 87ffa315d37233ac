/// Failure programming or serving the cluster topology.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("invalid shard address {0:?}")]
    InvalidAddress(String),
    #[error("failed to parse cluster config: {0}")]
    Config(String),
    #[error(transparent)]
    Client(#[from] shardkv_client::ClientError),
    #[error(transparent)]
    BucketMap(#[from] shardkv_bucket::BucketMapError),
}

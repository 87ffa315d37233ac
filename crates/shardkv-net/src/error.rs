use serde_json::Value;

/// Failure at the dispatcher layer. Transport-level failures are handled
/// directly by the connection reader task (never reach a handler); this
/// enum covers everything a registered handler or the permission/lock
/// checks ahead of it can produce.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("shard is locked")]
    ShardLocked,
    #[error("unauthorized: {0}")]
    AuthError(String),
    #[error("no such endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("no relocation pipe is open")]
    PipeMissing,
    #[error("relocation pipe does not match the requested peer")]
    PipeMismatch,
    #[error("a relocation pipe is already open")]
    PipeAlreadyOpen,
    #[error("{0}")]
    Handler(Value),
}

impl ServiceError {
    /// The `message` field of the `{type: "error", message}` envelope this
    /// error becomes at the connection boundary.
    pub fn as_message(&self) -> Value {
        match self {
            ServiceError::Handler(v) => v.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

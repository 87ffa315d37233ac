use serde_json::{json, Value};
use shardkv_engine::EngineError;
use shardkv_net::ServiceError;
use shardkv_store::StoreError;

/// Converts an engine/store-level failure into the `{type:"error",
/// message}` shape the dispatcher encodes, matching the source's
/// `self._handle_error_resp`.
pub fn engine_error_to_service(err: EngineError) -> ServiceError {
    ServiceError::Handler(engine_error_message(&err))
}

pub fn store_error_to_service(err: StoreError) -> ServiceError {
    ServiceError::Handler(json!(err.to_string()))
}

fn engine_error_message(err: &EngineError) -> Value {
    match err {
        EngineError::OutOfMemory { .. } => json!(format!("OutOfMemory: {err}")),
        other => json!(other.to_string()),
    }
}

pub fn missing_arg(name: &str) -> ServiceError {
    ServiceError::Handler(json!(format!("missing or invalid argument: {name}")))
}

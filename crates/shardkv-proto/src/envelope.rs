use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Failure decoding a wire payload as a well-formed envelope.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("malformed request envelope: {0}")]
    InvalidRequest(serde_json::Error),
    #[error("malformed response envelope: {0}")]
    InvalidResponse(serde_json::Error),
}

/// `{endpoint, args, kwargs}` — a single RPC call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub endpoint: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl RequestEnvelope {
    pub fn new(endpoint: impl Into<String>) -> Self {
        RequestEnvelope {
            endpoint: endpoint.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        // A `RequestEnvelope` is always representable as JSON; this cannot fail.
        serde_json::to_vec(self).expect("RequestEnvelope always serializes")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        serde_json::from_slice(bytes).map_err(ProtoError::InvalidRequest)
    }
}

/// `{type: "success"|"error", message}` — the reply to a single RPC call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    Success { message: Value },
    Error { message: Value },
}

impl ResponseEnvelope {
    pub fn success(message: Value) -> Self {
        ResponseEnvelope::Success { message }
    }

    pub fn error(message: impl Into<Value>) -> Self {
        ResponseEnvelope::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("ResponseEnvelope always serializes")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        serde_json::from_slice(bytes).map_err(ProtoError::InvalidResponse)
    }

    pub fn into_result(self) -> Result<Value, Value> {
        match self {
            ResponseEnvelope::Success { message } => Ok(message),
            ResponseEnvelope::Error { message } => Err(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trips_with_default_args_and_kwargs() {
        let req = RequestEnvelope::new("write");
        let bytes = req.encode();
        let decoded = RequestEnvelope::decode(&bytes).unwrap();
        assert_eq!(decoded, req);
        assert!(decoded.args.is_empty());
        assert!(decoded.kwargs.is_empty());
    }

    #[test]
    fn request_round_trips_with_args_and_kwargs() {
        let mut kwargs = Map::new();
        kwargs.insert("hash_".to_string(), json!(0.25));
        let req = RequestEnvelope::new("write")
            .with_args(vec![json!("t"), json!("k1")])
            .with_kwargs(kwargs);
        let decoded = RequestEnvelope::decode(&req.encode()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn success_response_round_trips() {
        let resp = ResponseEnvelope::success(json!({"hash": 0.5, "payload": "v1"}));
        let decoded = ResponseEnvelope::decode(&resp.encode()).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(
            decoded.into_result().unwrap(),
            json!({"hash": 0.5, "payload": "v1"})
        );
    }

    #[test]
    fn error_response_round_trips_and_into_result_is_err() {
        let resp = ResponseEnvelope::error(json!("out of memory"));
        let decoded = ResponseEnvelope::decode(&resp.encode()).unwrap();
        assert!(decoded.clone().into_result().is_err());
        assert_eq!(decoded, resp);
    }

    #[test]
    fn garbage_bytes_fail_to_decode_as_a_request() {
        assert!(RequestEnvelope::decode(b"not json").is_err());
    }
}

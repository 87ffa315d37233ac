use std::collections::HashMap;
use std::time::Duration;

/// `{group}` — the record a bearer token resolves to. Mirrors
/// `pyshard/core/server.py`'s `self._token_storage[token]`.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub group: String,
}

/// Per-server authentication policy: whether auth is enabled at all, the
/// preloaded token table, and the connect-time timeout bounding how long a
/// new connection has to send its bearer token.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub tokens: HashMap<String, TokenInfo>,
    pub auth_timeout: Duration,
}

impl AuthConfig {
    pub fn disabled() -> Self {
        AuthConfig {
            enabled: false,
            tokens: HashMap::new(),
            auth_timeout: Duration::from_secs(5),
        }
    }

    pub fn new(tokens: HashMap<String, TokenInfo>, auth_timeout: Duration) -> Self {
        AuthConfig {
            enabled: true,
            tokens,
            auth_timeout,
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&TokenInfo> {
        self.tokens.get(token)
    }
}

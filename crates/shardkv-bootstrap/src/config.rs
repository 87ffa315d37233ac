use std::path::Path;

use serde::Deserialize;

use crate::error::BootstrapError;

fn default_max_size() -> u64 {
    64 * 1024 * 1024
}

/// One shard's static placement: where it listens, the hash-range start it
/// should own, and its byte budget. Grounded on `spec.md` §4.8's startup
/// sequence — the source takes these as constructor arguments rather than
/// reading them from a file, so this is the file-backed rendition of the
/// same contract.
#[derive(Debug, Clone, Deserialize)]
pub struct ShardSpec {
    pub host: String,
    pub port: u16,
    pub start: f64,
    pub name: Option<String>,
    #[serde(default = "default_max_size")]
    pub max_size: u64,
}

fn default_bootstrap_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bootstrap_port() -> u16 {
    6999
}

/// The bootstrap's own listen address, read from the config document's
/// top-level `bootstrap` field. CLI flags take precedence when given.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapSpec {
    #[serde(default = "default_bootstrap_host")]
    pub host: String,
    #[serde(default = "default_bootstrap_port")]
    pub port: u16,
}

impl Default for BootstrapSpec {
    fn default() -> Self {
        BootstrapSpec {
            host: default_bootstrap_host(),
            port: default_bootstrap_port(),
        }
    }
}

/// The whole cluster's static topology, read from a YAML or JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub bootstrap: BootstrapSpec,
    pub shards: Vec<ShardSpec>,
}

impl ClusterConfig {
    pub fn from_yaml(data: &str) -> Result<Self, BootstrapError> {
        serde_yaml::from_str(data).map_err(|err| BootstrapError::Config(err.to_string()))
    }

    pub fn from_json(data: &str) -> Result<Self, BootstrapError> {
        serde_json::from_str(data).map_err(|err| BootstrapError::Config(err.to_string()))
    }

    /// Parses `path`, choosing YAML or JSON by its extension (anything
    /// other than `.json` is treated as YAML, which is a superset of JSON).
    pub fn from_path(path: &Path) -> Result<Self, BootstrapError> {
        let data = std::fs::read_to_string(path)
            .map_err(|err| BootstrapError::Config(format!("{}: {err}", path.display())))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&data),
            _ => Self::from_yaml(&data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_yaml_document() {
        let config = ClusterConfig::from_yaml(
            "shards:\n  - host: 127.0.0.1\n    port: 7000\n    start: 0.0\n",
        )
        .unwrap();
        assert_eq!(config.shards.len(), 1);
        assert_eq!(config.shards[0].max_size, default_max_size());
    }

    #[test]
    fn parses_a_json_document() {
        let config = ClusterConfig::from_json(
            r#"{"shards": [{"host": "127.0.0.1", "port": 7000, "start": 0.0, "max_size": 10}]}"#,
        )
        .unwrap();
        assert_eq!(config.shards[0].max_size, 10);
    }

    #[test]
    fn defaults_the_bootstrap_address_when_omitted() {
        let config = ClusterConfig::from_yaml(
            "shards:\n  - host: 127.0.0.1\n    port: 7000\n    start: 0.0\n",
        )
        .unwrap();
        assert_eq!(config.bootstrap.host, "127.0.0.1");
        assert_eq!(config.bootstrap.port, 6999);
    }

    #[test]
    fn parses_an_explicit_bootstrap_address() {
        let config = ClusterConfig::from_yaml(
            "bootstrap:\n  host: 0.0.0.0\n  port: 9000\nshards:\n  - host: 127.0.0.1\n    port: 7000\n    start: 0.0\n",
        )
        .unwrap();
        assert_eq!(config.bootstrap.host, "0.0.0.0");
        assert_eq!(config.bootstrap.port, 9000);
    }
}

use std::{fs, net::SocketAddr, path::Path};

use serde::Deserialize;
use url::Url;

use crate::error::{AggregatorError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub attestor: AttestorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub listener_addr: SocketAddr,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AttestorConfig {
    pub attestor_endpoints: Vec<Url>,
    pub quorum_threshold: usize,
    pub attestor_query_timeout_ms: u64,
    #[serde(default = "default_aggregation_timeout_ms")]
    pub aggregation_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub result_cache_capacity: u64,
    pub result_cache_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            result_cache_capacity: 1024,
            result_cache_ttl_secs: 30,
        }
    }
}

const fn default_aggregation_timeout_ms() -> u64 {
    5_000
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| AggregatorError::Config(format!("reading config failed: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AggregatorError::Config(format!("parsing config failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.attestor.attestor_endpoints.is_empty() {
            return Err(AggregatorError::Config(
                "no attestor endpoints configured".into(),
            ));
        }
        if self.attestor.quorum_threshold == 0
            || self.attestor.quorum_threshold > self.attestor.attestor_endpoints.len()
        {
            return Err(AggregatorError::Config(format!(
                "quorum {} not satisfiable by {} endpoints",
                self.attestor.quorum_threshold,
                self.attestor.attestor_endpoints.len()
            )));
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Log level for the fmt subscriber; unparseable values fall back to INFO.
    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(endpoints: usize, quorum: usize) -> Config {
        Config {
            server: ServerConfig {
                listener_addr: "127.0.0.1:50060".parse().unwrap(),
                log_level: "INFO".to_string(),
            },
            attestor: AttestorConfig {
                attestor_endpoints: (0..endpoints)
                    .map(|i| Url::parse(&format!("http://127.0.0.1:{}", 50000 + i)).unwrap())
                    .collect(),
                quorum_threshold: quorum,
                attestor_query_timeout_ms: 500,
                aggregation_timeout_ms: 5_000,
            },
            cache: CacheConfig::default(),
        }
    }

    #[test]
    fn parses_a_full_toml_config() {
        let raw = r#"
            [server]
            listener_addr = "127.0.0.1:50060"
            log_level = "DEBUG"

            [attestor]
            attestor_endpoints = ["http://127.0.0.1:50051", "http://127.0.0.1:50052"]
            quorum_threshold = 2
            attestor_query_timeout_ms = 250

            [cache]
            result_cache_capacity = 64
            result_cache_ttl_secs = 10
        "#;

        let config: Config = toml::from_str(raw).expect("valid config");
        assert_eq!(config.attestor.attestor_endpoints.len(), 2);
        assert_eq!(config.attestor.aggregation_timeout_ms, 5_000);
        assert_eq!(config.cache.result_cache_capacity, 64);
        assert_eq!(config.server.log_level(), tracing::Level::DEBUG);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unsatisfiable_quorum() {
        assert!(base_config(2, 3).validate().is_err());
        assert!(base_config(2, 0).validate().is_err());
        assert!(base_config(0, 1).validate().is_err());
        assert!(base_config(3, 2).validate().is_ok());
    }
}

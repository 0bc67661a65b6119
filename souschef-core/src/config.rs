//! Runtime configuration from `SOUSCHEF_*` environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::actor::ActorConfig;
use crate::error::{ConfigError, FetchError};
use crate::fetch::HostPolicy;
use crate::http::{FetchClient, FetchClientBuilder};
use crate::store::{FileStore, HttpStore, MemoryStore, SessionStore};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Where live sessions are saved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreSpec {
    #[default]
    Memory,
    File(PathBuf),
    Http(String),
}

impl StoreSpec {
    /// Parse `memory`, `file:<path>` or `http:<url>`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("memory") {
            return Ok(Self::Memory);
        }
        if let Some(path) = raw.strip_prefix("file:") {
            if !path.is_empty() {
                return Ok(Self::File(PathBuf::from(path)));
            }
        }
        if let Some(url) = raw.strip_prefix("http:") {
            // Accept both `http:https://host/x` and a bare `http://host/x`
            let url = if url.starts_with("//") {
                raw.to_string()
            } else {
                url.to_string()
            };
            if url::Url::parse(&url).is_ok() {
                return Ok(Self::Http(url));
            }
        }
        Err(ConfigError::InvalidStore(raw.to_string()))
    }

    pub fn open(&self) -> Arc<dyn SessionStore> {
        match self {
            Self::Memory => Arc::new(MemoryStore::new()),
            Self::File(path) => Arc::new(FileStore::new(path.clone())),
            Self::Http(url) => Arc::new(HttpStore::new(url.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub allowed_hosts: HostPolicy,
    pub store: StoreSpec,
    pub tick: Duration,
    pub grace_ms: i64,
    pub fetch_timeout: Duration,
    pub rate_limit: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            allowed_hosts: HostPolicy::allow_all(),
            store: StoreSpec::Memory,
            tick: Duration::from_millis(1000),
            grace_ms: 1000,
            fetch_timeout: Duration::from_secs(30),
            rate_limit: Duration::from_millis(200),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str| -> Result<Option<u64>, ConfigError> {
            get(key)
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                        var: key.to_string(),
                        value: v.clone(),
                    })
                })
                .transpose()
        };

        let mut config = Self::default();
        if let Some(addr) = get("SOUSCHEF_BIND_ADDR") {
            config.bind_addr = addr.trim().to_string();
        }
        if let Some(hosts) = get("SOUSCHEF_ALLOWED_HOSTS") {
            config.allowed_hosts = HostPolicy::from_list(&hosts);
        }
        if let Some(store) = get("SOUSCHEF_SESSION_STORE") {
            config.store = StoreSpec::parse(&store)?;
        }
        if let Some(ms) = number("SOUSCHEF_TICK_MS")? {
            config.tick = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = number("SOUSCHEF_GRACE_MS")? {
            config.grace_ms = i64::try_from(ms).unwrap_or(i64::MAX);
        }
        if let Some(secs) = number("SOUSCHEF_FETCH_TIMEOUT_SECS")? {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = number("SOUSCHEF_RATE_LIMIT_MS")? {
            config.rate_limit = Duration::from_millis(ms);
        }
        Ok(config)
    }

    pub fn actor_config(&self) -> ActorConfig {
        ActorConfig {
            tick: self.tick,
            grace_ms: self.grace_ms,
            ..ActorConfig::default()
        }
    }

    pub fn fetch_client(&self) -> Result<FetchClient, FetchError> {
        FetchClientBuilder::new()
            .timeout(self.fetch_timeout)
            .rate_limit(self.rate_limit)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert!(config.allowed_hosts.is_unrestricted());
        assert_eq!(config.store, StoreSpec::Memory);
        assert_eq!(config.tick, Duration::from_secs(1));
        assert_eq!(config.grace_ms, 1000);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("SOUSCHEF_BIND_ADDR", "127.0.0.1:8080"),
            ("SOUSCHEF_ALLOWED_HOSTS", "allrecipes.com"),
            ("SOUSCHEF_SESSION_STORE", "file:/tmp/session.json"),
            ("SOUSCHEF_TICK_MS", "250"),
            ("SOUSCHEF_RATE_LIMIT_MS", "0"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert!(config.allowed_hosts.permits("www.allrecipes.com", None));
        assert!(!config.allowed_hosts.permits("example.com", None));
        assert_eq!(
            config.store,
            StoreSpec::File(PathBuf::from("/tmp/session.json"))
        );
        assert_eq!(config.tick, Duration::from_millis(250));
        assert_eq!(config.rate_limit, Duration::ZERO);
    }

    #[test]
    fn test_invalid_number() {
        assert_eq!(
            config(&[("SOUSCHEF_TICK_MS", "soon")]).unwrap_err(),
            ConfigError::InvalidNumber {
                var: "SOUSCHEF_TICK_MS".to_string(),
                value: "soon".to_string(),
            }
        );
    }

    #[test]
    fn test_store_spec_parsing() {
        assert_eq!(StoreSpec::parse("memory").unwrap(), StoreSpec::Memory);
        assert_eq!(
            StoreSpec::parse("http:https://example.com/api/session-store").unwrap(),
            StoreSpec::Http("https://example.com/api/session-store".to_string())
        );
        assert_eq!(
            StoreSpec::parse("http://localhost:3000/api/session-store").unwrap(),
            StoreSpec::Http("http://localhost:3000/api/session-store".to_string())
        );
        assert!(StoreSpec::parse("file:").is_err());
        assert!(StoreSpec::parse("redis://x").is_err());
    }
}

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Environment variable overriding `store.postgres_url`
pub const ENV_DB_SOURCE: &str = "DB_SOURCE";
/// Environment variable overriding `gateway.host` and `gateway.port` (`host:port`)
pub const ENV_SERVER_ADDRESS: &str = "SERVER_ADDRESS";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Upper bound on one transfer transaction, lock waits included
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Row lock wait limit of the memory backend
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            postgres_url: None,
            max_connections: default_max_connections(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_transfer_timeout_ms() -> u64 {
    10_000
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply environment overrides
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `DB_SOURCE` / `SERVER_ADDRESS` as returned by `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DB_SOURCE).filter(|v| !v.is_empty()) {
            self.store.postgres_url = Some(url);
        }

        if let Some(addr) = lookup(ENV_SERVER_ADDRESS).filter(|v| !v.is_empty()) {
            let (host, port) = addr
                .rsplit_once(':')
                .with_context(|| format!("{} must be host:port, got {}", ENV_SERVER_ADDRESS, addr))?;
            self.gateway.port = port
                .parse()
                .with_context(|| format!("invalid port in {}: {}", ENV_SERVER_ADDRESS, addr))?;
            if !host.is_empty() {
                self.gateway.host = host.to_string();
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Postgres && self.store.postgres_url.is_none() {
            bail!(
                "store.backend is postgres but no postgres_url is set (config or {})",
                ENV_DB_SOURCE
            );
        }
        if self.store.max_connections == 0 {
            bail!("store.max_connections must be at least 1");
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.store.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
log_level: info
log_dir: ./logs
log_file: ledger.log
use_json: false
rotation: daily
gateway:
  host: 0.0.0.0
  port: 8080
store:
  backend: memory
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = AppConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.max_connections, 10);
        assert_eq!(config.lock_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.transfer_timeout(), Duration::from_secs(10));
        assert_eq!(config.server_address(), "0.0.0.0:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::from_yaml(YAML).unwrap();
        config
            .apply_overrides(|key| match key {
                ENV_DB_SOURCE => Some("postgresql://u:p@db:5432/bank".to_string()),
                ENV_SERVER_ADDRESS => Some("127.0.0.1:9090".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(
            config.store.postgres_url.as_deref(),
            Some("postgresql://u:p@db:5432/bank")
        );
        assert_eq!(config.server_address(), "127.0.0.1:9090");
    }

    #[test]
    fn test_bad_server_address_is_rejected() {
        let mut config = AppConfig::from_yaml(YAML).unwrap();
        let res = config.apply_overrides(|key| {
            (key == ENV_SERVER_ADDRESS).then(|| "localhost".to_string())
        });
        assert!(res.is_err());
    }

    #[test]
    fn test_postgres_backend_requires_url() {
        let yaml = YAML.replace("backend: memory", "backend: postgres");
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_configs_parse() {
        let dev = AppConfig::from_yaml(include_str!("../config/dev.yaml")).unwrap();
        assert_eq!(dev.store.backend, StoreBackend::Memory);
        assert!(dev.validate().is_ok());

        let prod = AppConfig::from_yaml(include_str!("../config/prod.yaml")).unwrap();
        assert_eq!(prod.store.backend, StoreBackend::Postgres);
        assert!(prod.use_json);
        assert!(prod.validate().is_ok());
    }

    #[test]
    fn test_unknown_backend_fails_to_parse() {
        let yaml = YAML.replace("backend: memory", "backend: sqlite");
        assert!(AppConfig::from_yaml(&yaml).is_err());
    }
}

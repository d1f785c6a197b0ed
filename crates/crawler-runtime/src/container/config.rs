//! # Crawler Configuration
//!
//! Unified configuration for the crawling engine, the stores and the two
//! daemons.
//!
//! ## Loading Order
//!
//! 1. Built-in defaults
//! 2. TOML file named by `CRAWLER_CONFIG` (every section and key optional)
//! 3. `CRAWLER_*` environment variables
//!
//! The result is checked by [`CrawlerNodeConfig::validate`] before use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nc_01_peer_crawler::{Candidate, CrawlerConfig, HandshakeConfig, LookupConfig, Network};
use nc_03_dataset_sync::{EvictionConfig, EvictionErrorPolicy, SyncConfig};
use serde::Deserialize;
use shared_types::decode_hash;
use thiserror::Error;

/// Environment variable naming the TOML file.
pub const CONFIG_PATH_VAR: &str = "CRAWLER_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("invalid config file: {0}")]
    Parse(String),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete crawler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlerNodeConfig {
    pub network: NetworkSection,
    pub crawler: CrawlerSection,
    pub sync: SyncSection,
    pub eviction: EvictionSection,
    pub storage: StorageSection,
}

/// Overlay membership and local identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSection {
    /// `mainnet`, `sepolia`, `goerli` or `custom`
    pub network: String,
    /// Required for `custom`
    pub network_id: Option<u64>,
    /// Required for `custom`, hex
    pub genesis_hash: Option<String>,
    /// `enode://` URLs seeding the lookup table
    pub bootnodes: Vec<String>,
    /// TCP address answering status handshakes
    pub listen_addr: String,
    /// Hex secp256k1 secret; a fresh key is generated when absent
    pub node_key: Option<String>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            network: "mainnet".to_string(),
            network_id: None,
            genesis_hash: None,
            bootnodes: Vec::new(),
            listen_addr: "0.0.0.0:30303".to_string(),
            node_key: None,
        }
    }
}

/// Crawling engine limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlerSection {
    pub workers: usize,
    pub probe_timeout_secs: u64,
    pub idle_delay_ms: u64,
    pub table_capacity: usize,
}

impl Default for CrawlerSection {
    fn default() -> Self {
        Self {
            workers: 16,
            probe_timeout_secs: 10,
            idle_delay_ms: 1000,
            table_capacity: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    pub base_interval_secs: u64,
    pub max_backoff_secs: u64,
    pub idle_interval_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            base_interval_secs: 60,
            max_backoff_secs: 3600,
            idle_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvictionSection {
    pub interval_secs: u64,
    pub retention_secs: u64,
    pub on_error: EvictionErrorPolicy,
}

impl Default for EvictionSection {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            retention_secs: 24 * 60 * 60,
            on_error: EvictionErrorPolicy::Fatal,
        }
    }
}

/// Which store implementation backs the transient and serving stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub backend: StorageBackend,
    pub transient_path: PathBuf,
    pub serving_path: PathBuf,
    /// fsync every write batch (RocksDB only)
    pub sync_writes: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            transient_path: PathBuf::from("./data/transient"),
            serving_path: PathBuf::from("./data/serving"),
            sync_writes: true,
        }
    }
}

impl CrawlerNodeConfig {
    /// Defaults, then the `CRAWLER_CONFIG` file if set, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `CRAWLER_*` overrides read through `lookup`.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `CRAWLER_NETWORK` | `network.network` |
    /// | `CRAWLER_NETWORK_ID` | `network.network_id` |
    /// | `CRAWLER_GENESIS_HASH` | `network.genesis_hash` |
    /// | `CRAWLER_BOOTNODES` | `network.bootnodes` (comma separated) |
    /// | `CRAWLER_LISTEN_ADDR` | `network.listen_addr` |
    /// | `CRAWLER_NODE_KEY` | `network.node_key` |
    /// | `CRAWLER_WORKERS` | `crawler.workers` |
    /// | `CRAWLER_PROBE_TIMEOUT_SECS` | `crawler.probe_timeout_secs` |
    /// | `CRAWLER_SYNC_INTERVAL_SECS` | `sync.base_interval_secs` |
    /// | `CRAWLER_MAX_BACKOFF_SECS` | `sync.max_backoff_secs` |
    /// | `CRAWLER_EVICTION_INTERVAL_SECS` | `eviction.interval_secs` |
    /// | `CRAWLER_RETENTION_SECS` | `eviction.retention_secs` |
    /// | `CRAWLER_EVICTION_POLICY` | `eviction.on_error` |
    /// | `CRAWLER_STORAGE` | `storage.backend` |
    /// | `CRAWLER_TRANSIENT_PATH` | `storage.transient_path` |
    /// | `CRAWLER_SERVING_PATH` | `storage.serving_path` |
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CRAWLER_NETWORK") {
            self.network.network = v;
        }
        if let Some(v) = lookup("CRAWLER_NETWORK_ID") {
            self.network.network_id = Some(parse_var("CRAWLER_NETWORK_ID", v)?);
        }
        if let Some(v) = lookup("CRAWLER_GENESIS_HASH") {
            self.network.genesis_hash = Some(v);
        }
        if let Some(v) = lookup("CRAWLER_BOOTNODES") {
            self.network.bootnodes = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("CRAWLER_LISTEN_ADDR") {
            self.network.listen_addr = v;
        }
        if let Some(v) = lookup("CRAWLER_NODE_KEY") {
            self.network.node_key = Some(v);
        }
        if let Some(v) = lookup("CRAWLER_WORKERS") {
            self.crawler.workers = parse_var("CRAWLER_WORKERS", v)?;
        }
        if let Some(v) = lookup("CRAWLER_PROBE_TIMEOUT_SECS") {
            self.crawler.probe_timeout_secs = parse_var("CRAWLER_PROBE_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("CRAWLER_SYNC_INTERVAL_SECS") {
            self.sync.base_interval_secs = parse_var("CRAWLER_SYNC_INTERVAL_SECS", v)?;
        }
        if let Some(v) = lookup("CRAWLER_MAX_BACKOFF_SECS") {
            self.sync.max_backoff_secs = parse_var("CRAWLER_MAX_BACKOFF_SECS", v)?;
        }
        if let Some(v) = lookup("CRAWLER_EVICTION_INTERVAL_SECS") {
            self.eviction.interval_secs = parse_var("CRAWLER_EVICTION_INTERVAL_SECS", v)?;
        }
        if let Some(v) = lookup("CRAWLER_RETENTION_SECS") {
            self.eviction.retention_secs = parse_var("CRAWLER_RETENTION_SECS", v)?;
        }
        if let Some(v) = lookup("CRAWLER_EVICTION_POLICY") {
            self.eviction.on_error = match v.to_ascii_lowercase().as_str() {
                "fatal" => EvictionErrorPolicy::Fatal,
                "retry_transient" => EvictionErrorPolicy::RetryTransient,
                "retry_all" => EvictionErrorPolicy::RetryAll,
                _ => {
                    return Err(ConfigError::Env {
                        var: "CRAWLER_EVICTION_POLICY",
                        value: v,
                    })
                }
            };
        }
        if let Some(v) = lookup("CRAWLER_STORAGE") {
            self.storage.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::Rocksdb,
                _ => {
                    return Err(ConfigError::Env {
                        var: "CRAWLER_STORAGE",
                        value: v,
                    })
                }
            };
        }
        if let Some(v) = lookup("CRAWLER_TRANSIENT_PATH") {
            self.storage.transient_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("CRAWLER_SERVING_PATH") {
            self.storage.serving_path = PathBuf::from(v);
        }
        Ok(())
    }

    /// Reject configurations the daemons cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawler.workers == 0 {
            return Err(ConfigError::Invalid("crawler.workers must be at least 1".into()));
        }
        if self.crawler.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid("crawler.probe_timeout_secs must be positive".into()));
        }
        if self.sync.base_interval_secs == 0 {
            return Err(ConfigError::Invalid("sync.base_interval_secs must be positive".into()));
        }
        if self.sync.max_backoff_secs < self.sync.base_interval_secs {
            return Err(ConfigError::Invalid(
                "sync.max_backoff_secs must not be below sync.base_interval_secs".into(),
            ));
        }
        if self.eviction.interval_secs == 0 {
            return Err(ConfigError::Invalid("eviction.interval_secs must be positive".into()));
        }
        if self.eviction.retention_secs == 0 {
            return Err(ConfigError::Invalid("eviction.retention_secs must be positive".into()));
        }
        self.handshake_config()?;
        self.bootnodes()?;
        Ok(())
    }

    /// Handshake parameters for the selected network.
    pub fn handshake_config(&self) -> Result<HandshakeConfig, ConfigError> {
        let net = &self.network;
        if net.network.eq_ignore_ascii_case("custom") {
            let network_id = net
                .network_id
                .ok_or_else(|| ConfigError::Invalid("custom network requires network.network_id".into()))?;
            let genesis = net
                .genesis_hash
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid("custom network requires network.genesis_hash".into()))?;
            let genesis_hash =
                decode_hash(genesis).map_err(|e| ConfigError::Invalid(format!("network.genesis_hash: {}", e)))?;
            return Ok(HandshakeConfig::for_network(network_id, genesis_hash));
        }

        let preset: Network = net.network.parse().map_err(ConfigError::Invalid)?;
        Ok(HandshakeConfig::for_network(preset.network_id(), preset.genesis_hash()))
    }

    pub fn bootnodes(&self) -> Result<Vec<Candidate>, ConfigError> {
        self.network
            .bootnodes
            .iter()
            .map(|entry| {
                entry
                    .parse()
                    .map_err(|reason| ConfigError::Invalid(format!("bootnode {}: {}", entry, reason)))
            })
            .collect()
    }

    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig {
            workers: self.crawler.workers,
            probe_timeout: Duration::from_secs(self.crawler.probe_timeout_secs),
            idle_delay: Duration::from_millis(self.crawler.idle_delay_ms),
        }
    }

    pub fn lookup_config(&self) -> LookupConfig {
        LookupConfig {
            table_capacity: self.crawler.table_capacity,
            ..Default::default()
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            base_interval: Duration::from_secs(self.sync.base_interval_secs),
            max_backoff: Duration::from_secs(self.sync.max_backoff_secs),
            idle_interval: Duration::from_millis(self.sync.idle_interval_ms),
        }
    }

    pub fn eviction_config(&self) -> EvictionConfig {
        EvictionConfig {
            interval: Duration::from_secs(self.eviction.interval_secs),
            retention: Duration::from_secs(self.eviction.retention_secs),
            policy: self.eviction.on_error,
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CrawlerNodeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.crawler_config().workers, 16);
        assert_eq!(config.sync_config().base_interval, Duration::from_secs(60));
        assert_eq!(config.eviction_config().interval, Duration::from_secs(600));
        assert_eq!(config.eviction_config().policy, EvictionErrorPolicy::Fatal);
        assert_eq!(config.handshake_config().unwrap().network_id, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CrawlerNodeConfig::from_toml_str(
            r#"
            [network]
            network = "sepolia"

            [eviction]
            retention_secs = 3600
            on_error = "retry_transient"
            "#,
        )
        .unwrap();

        assert_eq!(config.handshake_config().unwrap().network_id, 11155111);
        assert_eq!(config.eviction.retention_secs, 3600);
        assert_eq!(config.eviction.on_error, EvictionErrorPolicy::RetryTransient);
        assert_eq!(config.crawler.workers, 16);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawler.toml");
        std::fs::write(
            &path,
            "[storage]\nbackend = \"rocksdb\"\nserving_path = \"/var/lib/crawler/serving\"\n",
        )
        .unwrap();

        let config = CrawlerNodeConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Rocksdb);
        assert_eq!(config.storage.serving_path, PathBuf::from("/var/lib/crawler/serving"));

        let missing = CrawlerNodeConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = CrawlerNodeConfig::from_toml_str("[crawler]\nworkerz = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = CrawlerNodeConfig::from_toml_str("[crawler]\nworkers = 4\n").unwrap();
        config
            .apply_env(env(&[
                ("CRAWLER_WORKERS", "32"),
                ("CRAWLER_STORAGE", "rocksdb"),
                ("CRAWLER_EVICTION_POLICY", "retry_all"),
                ("CRAWLER_BOOTNODES", " a , ,b "),
            ]))
            .unwrap();

        assert_eq!(config.crawler.workers, 32);
        assert_eq!(config.storage.backend, StorageBackend::Rocksdb);
        assert_eq!(config.eviction.on_error, EvictionErrorPolicy::RetryAll);
        assert_eq!(config.network.bootnodes, vec!["a", "b"]);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = CrawlerNodeConfig::default();
        let err = config.apply_env(env(&[("CRAWLER_WORKERS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "CRAWLER_WORKERS", .. }));
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let mut config = CrawlerNodeConfig::default();
        config.crawler.workers = 0;
        assert!(config.validate().is_err());

        let mut config = CrawlerNodeConfig::default();
        config.eviction.retention_secs = 0;
        assert!(config.validate().is_err());

        let mut config = CrawlerNodeConfig::default();
        config.sync.max_backoff_secs = 10;
        assert!(config.validate().is_err());

        let mut config = CrawlerNodeConfig::default();
        config.network.bootnodes = vec!["not-an-enode".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_network() {
        let mut config = CrawlerNodeConfig::default();
        config.network.network = "custom".into();
        assert!(config.handshake_config().is_err());

        config.network.network_id = Some(1337);
        config.network.genesis_hash = Some(format!("0x{}", "ab".repeat(32)));
        let handshake = config.handshake_config().unwrap();
        assert_eq!(handshake.network_id, 1337);
        assert_eq!(handshake.genesis_hash, [0xab; 32]);
    }

    #[test]
    fn test_unknown_network_preset() {
        let mut config = CrawlerNodeConfig::default();
        config.network.network = "ropsten".into();
        assert!(matches!(config.handshake_config(), Err(ConfigError::Invalid(_))));
    }
}

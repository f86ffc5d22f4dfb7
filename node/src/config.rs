//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bastion_store::DbConfig;

use crate::NodeError;

/// Configuration for a Bastion node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node root directory. Relative paths in the other sections resolve
    /// against it.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub migration: MigrationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Application settings: database, genesis snapshot and admin service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub db_host: String,

    #[serde(default)]
    pub db_port: String,

    #[serde(default)]
    pub db_user: String,

    #[serde(default)]
    pub db_pass: String,

    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// Genesis snapshot file (plain or `.gz`). Required only on a fresh
    /// store when the genesis pins an application hash.
    #[serde(default)]
    pub genesis_state: String,

    #[serde(default = "default_genesis_file")]
    pub genesis_file: String,

    #[serde(default = "default_private_key_file")]
    pub private_key_file: String,

    /// Admin service listen address: `host:port`, a bare host, a URL such
    /// as `https://0.0.0.0:8485`, or a unix socket path.
    #[serde(default = "default_admin_listen_address")]
    pub admin_listen_address: String,

    /// Shared secret for the admin service. When empty, TLS clients must
    /// present a certificate instead.
    #[serde(default)]
    pub admin_pass: String,

    /// Serve the admin service without TLS even on non-loopback addresses.
    #[serde(default)]
    pub admin_notls: bool,

    /// Generate admin client credentials when no client CA file exists.
    #[serde(default)]
    pub autogen: bool,

    #[serde(default = "default_tls_cert_file")]
    pub tls_cert_file: String,

    #[serde(default = "default_tls_key_file")]
    pub tls_key_file: String,

    /// Subject alternative name for a generated server certificate.
    #[serde(default)]
    pub hostname: String,

    #[serde(default)]
    pub extra_hostnames: Vec<String>,

    #[serde(default)]
    pub skip_dependency_check: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub state_sync: StateSyncConfig,

    #[serde(default)]
    pub p2p: P2PConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateSyncConfig {
    #[serde(default)]
    pub enable: bool,

    /// Comma separated light-client provider endpoints.
    #[serde(default)]
    pub rpc_servers: String,

    /// Per-provider attempt timeout, in seconds.
    #[serde(default = "default_trust_timeout")]
    pub trust_timeout: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct P2PConfig {
    /// Comma separated node identities accepted in addition to validators.
    #[serde(default)]
    pub whitelist_peers: String,

    /// Comma separated `identity@host:port` entries.
    #[serde(default)]
    pub persistent_peers: String,

    /// Comma separated `identity@host:port` entries.
    #[serde(default)]
    pub seeds: String,

    /// Only whitelisted peers may connect.
    #[serde(default)]
    pub private_mode: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Zero-downtime migration support.
    #[serde(default)]
    pub enable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_root_dir() -> PathBuf {
    PathBuf::from("./bastion_data")
}

fn default_db_name() -> String {
    "bastion".to_string()
}

fn default_genesis_file() -> String {
    "genesis.json".to_string()
}

fn default_private_key_file() -> String {
    "private_key".to_string()
}

fn default_admin_listen_address() -> String {
    "127.0.0.1:8485".to_string()
}

fn default_tls_cert_file() -> String {
    "admin.cert".to_string()
}

fn default_tls_key_file() -> String {
    "admin.key".to_string()
}

fn default_trust_timeout() -> u64 {
    10
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            app: AppConfig::default(),
            chain: ChainConfig::default(),
            migration: MigrationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_host: String::new(),
            db_port: String::new(),
            db_user: String::new(),
            db_pass: String::new(),
            db_name: default_db_name(),
            genesis_state: String::new(),
            genesis_file: default_genesis_file(),
            private_key_file: default_private_key_file(),
            admin_listen_address: default_admin_listen_address(),
            admin_pass: String::new(),
            admin_notls: false,
            autogen: false,
            tls_cert_file: default_tls_cert_file(),
            tls_key_file: default_tls_key_file(),
            hostname: String::new(),
            extra_hostnames: Vec::new(),
            skip_dependency_check: false,
        }
    }
}

impl Default for StateSyncConfig {
    fn default() -> Self {
        Self {
            enable: false,
            rpc_servers: String::new(),
            trust_timeout: default_trust_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Resolve a configured path against the root directory. Absolute paths
    /// are returned unchanged.
    pub fn root_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    pub fn genesis_path(&self) -> PathBuf {
        self.root_path(&self.app.genesis_file)
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.root_path(&self.app.private_key_file)
    }

    /// The genesis snapshot path, or `None` when none is configured.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        let configured = self.app.genesis_state.trim();
        (!configured.is_empty()).then(|| self.root_path(configured))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            host: self.app.db_host.clone(),
            port: self.app.db_port.clone(),
            user: self.app.db_user.clone(),
            pass: self.app.db_pass.clone(),
        }
    }

    /// Light-client provider endpoints as configured: trimmed, blanks dropped.
    pub fn state_sync_providers(&self) -> Vec<String> {
        self.chain
            .state_sync
            .rpc_servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn trust_timeout(&self) -> Duration {
        Duration::from_secs(self.chain.state_sync.trust_timeout)
    }

    /// Hostnames for a generated server certificate.
    pub fn certificate_hostnames(&self) -> Vec<String> {
        std::iter::once(&self.app.hostname)
            .chain(self.app.extra_hostnames.iter())
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().expect("serialize");
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.app.admin_listen_address, config.app.admin_listen_address);
        assert_eq!(parsed.chain.state_sync.trust_timeout, 10);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.app.admin_listen_address, "127.0.0.1:8485");
        assert_eq!(config.app.tls_cert_file, "admin.cert");
        assert_eq!(config.logging.format, "human");
        assert!(!config.chain.state_sync.enable);
        assert!(config.snapshot_path().is_none());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            root_dir = "/var/lib/bastion"

            [app]
            genesis_state = "snapshot.sql.gz"
            admin_pass = "hunter2"

            [chain.state_sync]
            enable = true
            rpc_servers = " http://a:26657 , ,http://b:26657"

            [chain.p2p]
            seeds = "abc@1.2.3.4:26656"
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(
            config.snapshot_path(),
            Some(PathBuf::from("/var/lib/bastion/snapshot.sql.gz"))
        );
        assert_eq!(config.app.admin_pass, "hunter2");
        assert_eq!(
            config.state_sync_providers(),
            vec!["http://a:26657".to_string(), "http://b:26657".to_string()]
        );
        assert_eq!(config.chain.p2p.seeds, "abc@1.2.3.4:26656");
        assert_eq!(config.logging.level, "info"); // default
    }

    #[test]
    fn absolute_paths_are_not_rebased() {
        let config = NodeConfig {
            root_dir: PathBuf::from("/root"),
            ..Default::default()
        };
        assert_eq!(config.root_path("/etc/x.pem"), PathBuf::from("/etc/x.pem"));
        assert_eq!(config.root_path("x.pem"), PathBuf::from("/root/x.pem"));
    }

    #[test]
    fn certificate_hostnames_skip_blanks() {
        let mut config = NodeConfig::default();
        config.app.hostname = "node.example.org".into();
        config.app.extra_hostnames = vec!["".into(), "10.0.0.7".into()];
        assert_eq!(
            config.certificate_hostnames(),
            vec!["node.example.org".to_string(), "10.0.0.7".to_string()]
        );
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = NodeConfig::from_toml_str("root_dir = [").unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}

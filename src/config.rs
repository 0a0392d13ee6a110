use crate::core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Connection parameters for one database alias.
///
/// The embedded SQLite driver opens `name` as a file path (`:memory:` for a
/// private in-memory database). The network fields are kept so one config
/// file can describe every environment; SQLite ignores them.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Database (schema) name, the file path for SQLite
    pub name: String,
    pub user: String,
    /// Never serialized
    #[serde(alias = "pass", skip_serializing)]
    pub password: String,
    /// How long a statement waits on a locked database before failing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy_timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Config for a SQLite database at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        ConnectionConfig {
            name: path.into(),
            ..Default::default()
        }
    }

    /// Config for a private in-memory database.
    pub fn in_memory() -> Self {
        ConnectionConfig::sqlite(":memory:")
    }

    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.name == ":memory:"
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

/// Top-level configuration parsed from a TOML file: one table per alias.
///
/// ```toml
/// [databases.default]
/// name = "app.db"
/// busy_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub databases: BTreeMap<String, ConnectionConfig>,
}

/// Parses a registry configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RegistryConfig> {
    Ok(toml::from_str(content)?)
}

/// Loads a registry configuration from the TOML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RegistryConfig> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

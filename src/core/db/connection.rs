/// Connection Management Module
///
/// The alias registry: configuration per alias and at most one lazily opened
/// SQLite connection per alias, shared by every `Database` handle for it.

use super::query::Database;
use crate::config::{ConnectionConfig, RegistryConfig};
use crate::core::{DbError, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Alias used by `Registry::open_default`.
pub const DEFAULT_ALIAS: &str = "default";

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// An open driver connection shared by all handles of one alias.
#[derive(Debug)]
pub struct SharedConnection {
    id: u64,
    connection: Mutex<Connection>,
}

impl SharedConnection {
    /// Opens a connection and prepares it for the query helpers
    fn open(alias: &str, config: &ConnectionConfig) -> Result<Self> {
        let conn = Connection::open(&config.name).map_err(|e| {
            DbError::Connection(format!(
                "Failed to open database '{}' for alias '{}': {}",
                config.name, alias, e
            ))
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DbError::Connection(format!("Failed to initialize connection: {}", e)))?;

        if let Some(ms) = config.busy_timeout_ms {
            conn.busy_timeout(Duration::from_millis(ms))
                .map_err(|e| DbError::Connection(format!("Failed to set busy timeout: {}", e)))?;
        }

        register_now_function(&conn)
            .map_err(|e| DbError::Connection(format!("Failed to register NOW(): {}", e)))?;

        Ok(SharedConnection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            connection: Mutex::new(conn),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| DbError::Connection("Failed to acquire database lock".to_string()))
    }
}

/// Registers `NOW()` so raw timestamp expressions in generated SQL run on
/// SQLite. Returns UTC in `YYYY-MM-DD HH:MM:SS`, the format of
/// `CURRENT_TIMESTAMP`.
fn register_now_function(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("now", 0, FunctionFlags::SQLITE_UTF8, |_ctx| {
        Ok(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
    })
}

#[derive(Debug)]
struct AliasEntry {
    config: ConnectionConfig,
    connection: Option<Arc<SharedConnection>>,
}

/// Named database configurations and their shared connections.
///
/// Built once by application startup code and passed to whatever needs a
/// `Database`. Connections are opened on first `open` of an alias and live
/// as long as the registry.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, AliasEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Creates a registry with every alias of a loaded configuration.
    pub fn from_config(config: RegistryConfig) -> Self {
        let registry = Registry::new();
        if let Ok(mut entries) = registry.entries.lock() {
            for (alias, config) in config.databases {
                debug!(alias = %alias, database = %config.name, "configured database alias");
                entries.insert(alias, AliasEntry { config, connection: None });
            }
        }
        registry
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, AliasEntry>>> {
        self.entries
            .lock()
            .map_err(|_| DbError::Connection("Failed to acquire registry lock".to_string()))
    }

    /// Stores or replaces the configuration for `alias`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Config` once the alias has an open connection.
    pub fn configure(&self, alias: impl Into<String>, config: ConnectionConfig) -> Result<()> {
        let alias = alias.into();
        let mut entries = self.entries()?;

        if let Some(entry) = entries.get(&alias) {
            if entry.connection.is_some() {
                warn!(alias = %alias, "rejected reconfiguration of connected alias");
                return Err(DbError::Config(format!(
                    "alias '{}' is already connected; its configuration can no longer change",
                    alias
                )));
            }
        }

        debug!(alias = %alias, database = %config.name, "configured database alias");
        entries.insert(alias, AliasEntry { config, connection: None });
        Ok(())
    }

    /// Returns a handle bound to the shared connection of `alias`, opening
    /// the connection on first use.
    ///
    /// # Errors
    ///
    /// `DbError::Config` if the alias was never configured,
    /// `DbError::Connection` if the driver cannot open the database.
    pub fn open(&self, alias: &str) -> Result<Database> {
        let mut entries = self.entries()?;

        let entry = entries.get_mut(alias).ok_or_else(|| {
            warn!(alias = %alias, "open requested for unconfigured alias");
            DbError::Config(format!("alias '{}' is not configured", alias))
        })?;

        if let Some(shared) = &entry.connection {
            debug!(alias = %alias, connection_id = shared.id(), "reusing connection");
            return Ok(Database::new(alias, Arc::clone(shared)));
        }

        let shared = match SharedConnection::open(alias, &entry.config) {
            Ok(shared) => Arc::new(shared),
            Err(e) => {
                warn!(alias = %alias, error = %e, "failed to open connection");
                return Err(e);
            }
        };
        info!(
            alias = %alias,
            database = %entry.config.name,
            connection_id = shared.id(),
            "opened connection"
        );
        entry.connection = Some(Arc::clone(&shared));

        Ok(Database::new(alias, shared))
    }

    /// `open` for the `"default"` alias.
    pub fn open_default(&self) -> Result<Database> {
        self.open(DEFAULT_ALIAS)
    }

    pub fn is_configured(&self, alias: &str) -> bool {
        self.entries()
            .map(|e| e.contains_key(alias))
            .unwrap_or(false)
    }

    /// True once `open` has created the connection for `alias`.
    pub fn is_connected(&self, alias: &str) -> bool {
        self.entries()
            .ok()
            .and_then(|e| e.get(alias).map(|entry| entry.connection.is_some()))
            .unwrap_or(false)
    }

    /// Configured aliases, sorted.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .entries()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        aliases.sort();
        aliases
    }

    /// A copy of the stored configuration for `alias`.
    pub fn config(&self, alias: &str) -> Option<ConnectionConfig> {
        self.entries().ok()?.get(alias).map(|e| e.config.clone())
    }
}

//! Named SQLite connections with row, insert/update, transaction and
//! quoting helpers.
//!
//! ```no_run
//! use aliasdb::{ConnectionConfig, Registry, SqlValue};
//!
//! let registry = Registry::new();
//! registry.configure("default", ConnectionConfig::sqlite("app.db"))?;
//!
//! let db = registry.open_default()?;
//! let id = db.insert(
//!     "users",
//!     &[("username", SqlValue::from("alice")), ("created_at", SqlValue::now())],
//! )?;
//! let user = db.fetch_one("SELECT * FROM users WHERE id = ?1", [SqlValue::from(id)])?;
//! # Ok::<(), aliasdb::DbError>(())
//! ```

// Core infrastructure modules
pub mod core;

pub mod config;

pub use crate::config::{load_config, parse_config, ConnectionConfig, RegistryConfig};
pub use crate::core::db::{
    BindKind, Binding, BuiltStatement, Database, Params, Registry, Row, SqlValue, DEFAULT_ALIAS,
};
pub use crate::core::{DbError, Result};

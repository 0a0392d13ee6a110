/// Core Module
///
/// Shared infrastructure for aliasdb: the error type and the database layer
/// (values, SQL assembly, the connection registry and the query helpers).

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbError, Result};

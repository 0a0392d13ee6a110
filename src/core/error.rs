/// Error Module
///
/// Typed failures surfaced by the registry and the query helpers. Every
/// variant that originates in the driver carries the driver's diagnostic text.
use thiserror::Error;

/// Error type for every aliasdb operation.
///
/// - `Config`: an alias was used before it was configured, or reconfigured
///   after its connection was opened
/// - `Connection`: the driver could not open the database
/// - `Query`: statement preparation, binding or execution failed
/// - `Transaction`: BEGIN / COMMIT / ROLLBACK was rejected
#[derive(Error, Debug)]
pub enum DbError {
    /// Alias configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The underlying connection could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// SQL preparation and execution errors
    #[error("Query error: {0}")]
    Query(String),

    /// Transaction control errors
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// File system errors while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration
    #[error("Configuration format error: {0}")]
    ConfigFormat(#[from] toml::de::Error),
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;

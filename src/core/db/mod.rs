/// Database Module
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): the alias registry and the shared connections
/// - **Query Helpers** (`query.rs`): fetch/execute/insert/update, transactions, quoting
/// - **Statement Assembly** (`statement.rs`): INSERT and UPDATE SQL text and bindings
/// - **Values, Params, Rows** (`value.rs`, `params.rs`, `row.rs`): the data crossing the driver boundary
///
/// ## Error Handling
///
/// All database operations return `DbError`, carrying the driver's message.
pub mod connection;
pub mod params;
pub mod query;
pub mod row;
pub mod statement;
pub mod value;

pub use connection::*;
pub use params::*;
pub use query::*;
pub use row::*;
pub use statement::*;
pub use value::*;

/// Query Helper Module
///
/// `Database` is the handle application code works with: row fetching,
/// insert/update assembly, transaction control and literal quoting against
/// the shared connection of one alias.
///
/// Calls lock the shared connection for their duration only. Interleaving
/// transactions from several threads on one alias is the caller's problem;
/// give each worker its own alias if that is needed.

use super::connection::SharedConnection;
use super::params::Params;
use super::row::Row;
use super::statement::{build_insert, build_update, BuiltStatement};
use super::value::SqlValue;
use crate::core::{DbError, Result};
use rusqlite::{params_from_iter, Connection, Statement};
use std::sync::Arc;
use tracing::{debug, warn};

/// A lightweight handle on the shared connection of one alias.
#[derive(Debug, Clone)]
pub struct Database {
    alias: String,
    shared: Arc<SharedConnection>,
}

impl Database {
    pub(crate) fn new(alias: &str, shared: Arc<SharedConnection>) -> Self {
        Database {
            alias: alias.to_string(),
            shared,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Process-unique id of the underlying connection.
    pub fn connection_id(&self) -> u64 {
        self.shared.id()
    }

    pub fn shares_connection_with(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Executes a query and returns every row.
    ///
    /// # Arguments
    ///
    /// * `query` - SQL with `?`/`?N` or `:name` placeholders
    /// * `params` - values for the placeholders, `()` for none
    ///
    /// # Errors
    ///
    /// Returns `DbError::Query` if preparation or execution fails. Zero
    /// matching rows is an empty vector, not an error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use aliasdb::{Registry, SqlValue};
    /// # let registry = Registry::new();
    /// let db = registry.open_default()?;
    /// let rows = db.fetch_all(
    ///     "SELECT id, username FROM users WHERE id = :user_id",
    ///     [("user_id", SqlValue::from(1))],
    /// )?;
    /// # Ok::<(), aliasdb::DbError>(())
    /// ```
    pub fn fetch_all(&self, query: &str, params: impl Into<Params>) -> Result<Vec<Row>> {
        let params = params.into();
        let conn = self.shared.lock()?;
        let mut stmt = prepare(&conn, query)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = match &params {
            Params::None => stmt.query([]),
            Params::Positional(values) => stmt.query(params_from_iter(values.iter())),
            Params::Named(_) => stmt.query(params.named_refs().as_slice()),
        }
        .map_err(|e| query_failed(query, e))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(|e| query_failed(query, e))? {
            result.push(Row::from_driver(&names, row).map_err(|e| query_failed(query, e))?);
        }

        debug!(alias = %self.alias, rows = result.len(), "fetched rows");
        Ok(result)
    }

    /// Like `fetch_all` but only the first row; `None` when nothing matches.
    pub fn fetch_one(&self, query: &str, params: impl Into<Params>) -> Result<Option<Row>> {
        Ok(self.fetch_all(query, params)?.into_iter().next())
    }

    /// Runs a statement that returns no rows and reports the affected row
    /// count.
    pub fn execute(&self, query: &str, params: impl Into<Params>) -> Result<usize> {
        let params = params.into();
        let conn = self.shared.lock()?;
        let mut stmt = prepare(&conn, query)?;

        let changed = match &params {
            Params::None => stmt.execute([]),
            Params::Positional(values) => stmt.execute(params_from_iter(values.iter())),
            Params::Named(_) => stmt.execute(params.named_refs().as_slice()),
        }
        .map_err(|e| query_failed(query, e))?;

        debug!(alias = %self.alias, changed, "executed statement");
        Ok(changed)
    }

    /// Inserts one row and returns the new row id.
    ///
    /// Columns appear in the order of `fields`. Raw values (and text equal
    /// to `now()`) are written into the SQL instead of being bound.
    pub fn insert(&self, table: &str, fields: &[(&str, SqlValue)]) -> Result<i64> {
        let built = build_insert(table, fields)?;
        let conn = self.shared.lock()?;
        run_built(&conn, &built).map_err(|e| {
            warn!(alias = %self.alias, table, error = %e, "insert failed");
            DbError::Query(format!("Insert failed: {}", e))
        })?;

        let id = conn.last_insert_rowid();
        debug!(alias = %self.alias, table, id, "inserted row");
        Ok(id)
    }

    /// Updates the rows matching every `where_fields` equality and returns
    /// how many changed.
    pub fn update(
        &self,
        table: &str,
        fields: &[(&str, SqlValue)],
        where_fields: &[(&str, SqlValue)],
    ) -> Result<usize> {
        let built = build_update(table, fields, where_fields)?;
        let conn = self.shared.lock()?;
        let changed = run_built(&conn, &built).map_err(|e| {
            warn!(alias = %self.alias, table, error = %e, "update failed");
            DbError::Query(format!("Update failed: {}", e))
        })?;

        debug!(alias = %self.alias, table, changed, "updated rows");
        Ok(changed)
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.transaction_control("BEGIN")
    }

    pub fn commit(&self) -> Result<()> {
        self.transaction_control("COMMIT")
    }

    pub fn rollback(&self) -> Result<()> {
        self.transaction_control("ROLLBACK")
    }

    /// True while a transaction started on this connection is open.
    pub fn in_transaction(&self) -> Result<bool> {
        Ok(!self.shared.lock()?.is_autocommit())
    }

    /// Runs `f` inside a transaction: committed when it returns `Ok`, rolled
    /// back when it returns `Err`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    warn!(alias = %self.alias, error = %rollback_err, "rollback after failure also failed");
                }
                Err(e)
            }
        }
    }

    /// Quotes each value as a SQL literal and joins them with commas, for
    /// use inside `IN (...)`. The parentheses are the caller's.
    ///
    /// Quoting is done by SQLite's `quote()`: `["a", "b"]` gives `'a','b'`.
    pub fn quote_list(&self, values: &[SqlValue]) -> Result<String> {
        let conn = self.shared.lock()?;
        let mut stmt = prepare(&conn, "SELECT quote(?1)")?;

        let mut quoted = Vec::with_capacity(values.len());
        for value in values {
            let literal = match value {
                SqlValue::Raw(expr) => expr.clone(),
                _ => stmt
                    .query_row([value], |row| row.get::<_, String>(0))
                    .map_err(|e| DbError::Query(format!("Failed to quote value: {}", e)))?,
            };
            quoted.push(literal);
        }
        Ok(quoted.join(","))
    }

    fn transaction_control(&self, command: &str) -> Result<()> {
        let conn = self.shared.lock()?;
        conn.execute_batch(command).map_err(|e| {
            warn!(alias = %self.alias, command, error = %e, "transaction control failed");
            DbError::Transaction(format!("{} failed: {}", command, e))
        })?;
        debug!(alias = %self.alias, command, "transaction control");
        Ok(())
    }
}

fn prepare<'c>(conn: &'c Connection, query: &str) -> Result<Statement<'c>> {
    conn.prepare(query)
        .map_err(|e| DbError::Query(format!("Failed to prepare statement: {}", e)))
}

fn query_failed(query: &str, e: rusqlite::Error) -> DbError {
    warn!(query, error = %e, "query failed");
    DbError::Query(format!("Query execution failed: {}", e))
}

/// Prepares and executes an assembled statement, binding by name.
fn run_built(conn: &Connection, built: &BuiltStatement) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(&built.sql)?;
    stmt.execute(built.named_refs().as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::core::db::connection::Registry;

    fn setup_test_db() -> Database {
        let registry = Registry::new();
        registry.configure("default", ConnectionConfig::in_memory()).unwrap();
        let db = registry.open_default().unwrap();
        db.execute(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                username TEXT,
                score REAL,
                active BOOLEAN DEFAULT 1,
                created_at TEXT
            )",
            (),
        )
        .unwrap();
        db.execute(
            "INSERT INTO users (username, score) VALUES ('alice', 12.5), ('bob', 7.0)",
            (),
        )
        .unwrap();
        db
    }

    #[test]
    fn test_fetch_all_positional_and_named() {
        let db = setup_test_db();

        let rows = db
            .fetch_all("SELECT id, username FROM users WHERE score > ? ORDER BY id", [SqlValue::from(1)])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["id", "username"]);
        assert_eq!(rows[0].get_str("username"), Some("alice"));

        let rows = db
            .fetch_all("SELECT username FROM users WHERE id = :user_id", [(":user_id", SqlValue::from(2))])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("username"), Some("bob"));
    }

    #[test]
    fn test_zero_rows_is_not_an_error() {
        let db = setup_test_db();
        let rows = db
            .fetch_all("SELECT * FROM users WHERE username = ?1", [SqlValue::from("nobody")])
            .unwrap();
        assert!(rows.is_empty());

        let row = db
            .fetch_one("SELECT * FROM users WHERE username = ?1", [SqlValue::from("nobody")])
            .unwrap();
        assert!(row.is_none());
    }

    #[test]
    fn test_duplicate_column_names_last_wins() {
        let db = setup_test_db();
        let row = db.fetch_one("SELECT 1 AS x, 2 AS x", ()).unwrap().unwrap();
        assert_eq!(row.get("x"), Some(&SqlValue::Integer(2)));
        assert_eq!(row.to_json()["x"], 2);
    }

    #[test]
    fn test_fetch_one_returns_first_row() {
        let db = setup_test_db();
        let row = db.fetch_one("SELECT username FROM users ORDER BY id DESC", ()).unwrap().unwrap();
        assert_eq!(row.get_str("username"), Some("bob"));
    }

    #[test]
    fn test_query_error_handling() {
        let db = setup_test_db();

        match db.fetch_all("SELECT * FROM nonexistent_table", ()) {
            Err(DbError::Query(msg)) => assert!(msg.contains("no such table")),
            _ => panic!("Expected Query error"),
        }
        match db.execute("UPDATE nonexistent_table SET a = 1", ()) {
            Err(DbError::Query(msg)) => assert!(msg.contains("no such table")),
            _ => panic!("Expected Query error"),
        }
        match db.insert("nonexistent_table", &[("a", SqlValue::from(1))]) {
            Err(DbError::Query(msg)) => {
                assert!(msg.starts_with("Insert failed"));
                assert!(msg.contains("no such table"));
            }
            _ => panic!("Expected Query error"),
        }
        match db.update("users", &[("missing_column", SqlValue::from(1))], &[("id", SqlValue::from(1))]) {
            Err(DbError::Query(msg)) => {
                assert!(msg.starts_with("Update failed"));
                assert!(msg.contains("missing_column"));
            }
            _ => panic!("Expected Query error"),
        }
    }

    #[test]
    fn test_insert_returns_last_insert_id() {
        let db = setup_test_db();
        let id = db
            .insert("users", &[("username", SqlValue::from("carol")), ("score", SqlValue::from(3))])
            .unwrap();
        assert_eq!(id, 3);

        let row = db.fetch_one("SELECT username FROM users WHERE id = ?1", [SqlValue::from(id)]).unwrap().unwrap();
        assert_eq!(row.get_str("username"), Some("carol"));
    }

    #[test]
    fn test_insert_with_now() {
        let db = setup_test_db();
        let id = db
            .insert("users", &[("username", SqlValue::from("dave")), ("created_at", SqlValue::from("NOW()"))])
            .unwrap();

        let row = db
            .fetch_one("SELECT created_at FROM users WHERE id = :id", [("id", SqlValue::from(id))])
            .unwrap()
            .unwrap();
        let created_at = row.get_str("created_at").unwrap();
        assert_ne!(created_at, "NOW()");
        assert!(chrono::NaiveDateTime::parse_from_str(created_at, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[test]
    fn test_update_changes_matching_rows() {
        let db = setup_test_db();
        let changed = db
            .update(
                "users",
                &[("score", SqlValue::from(99)), ("created_at", SqlValue::now())],
                &[("username", SqlValue::from("alice"))],
            )
            .unwrap();
        assert_eq!(changed, 1);

        let row = db.fetch_one("SELECT score, created_at FROM users WHERE id = 1", ()).unwrap().unwrap();
        assert_eq!(row.get("score").and_then(SqlValue::as_f64), Some(99.0));
        assert!(row.get_str("created_at").is_some());

        let untouched = db.fetch_one("SELECT score FROM users WHERE id = 2", ()).unwrap().unwrap();
        assert_eq!(untouched.get("score"), Some(&SqlValue::Real(7.0)));
    }

    #[test]
    fn test_update_where_field_shadowing_set_field() {
        let db = setup_test_db();
        db.execute("CREATE TABLE tickets (id INTEGER PRIMARY KEY, status TEXT, where_status TEXT)", ())
            .unwrap();
        db.execute("INSERT INTO tickets (status, where_status) VALUES ('open', 'x')", ()).unwrap();

        let changed = db
            .update(
                "tickets",
                &[("where_status", SqlValue::from("A")), ("status", SqlValue::from("done"))],
                &[("status", SqlValue::from("open"))],
            )
            .unwrap();
        assert_eq!(changed, 1);

        let row = db.fetch_one("SELECT status, where_status FROM tickets", ()).unwrap().unwrap();
        assert_eq!(row.get_str("status"), Some("done"));
        assert_eq!(row.get_str("where_status"), Some("A"));
    }

    #[test]
    fn test_transactions() {
        let db = setup_test_db();

        db.begin_transaction().unwrap();
        assert!(db.in_transaction().unwrap());
        db.insert("users", &[("username", SqlValue::from("temp"))]).unwrap();
        db.rollback().unwrap();
        assert!(!db.in_transaction().unwrap());
        assert!(db.fetch_one("SELECT * FROM users WHERE username = 'temp'", ()).unwrap().is_none());

        db.begin_transaction().unwrap();
        db.insert("users", &[("username", SqlValue::from("kept"))]).unwrap();
        db.commit().unwrap();
        assert!(db.fetch_one("SELECT * FROM users WHERE username = 'kept'", ()).unwrap().is_some());
    }

    #[test]
    fn test_transaction_errors() {
        let db = setup_test_db();

        db.begin_transaction().unwrap();
        match db.begin_transaction() {
            Err(DbError::Transaction(msg)) => assert!(msg.contains("within a transaction")),
            _ => panic!("Expected Transaction error"),
        }
        db.rollback().unwrap();

        assert!(matches!(db.commit(), Err(DbError::Transaction(_))));
        assert!(matches!(db.rollback(), Err(DbError::Transaction(_))));
    }

    #[test]
    fn test_transaction_closure() {
        let db = setup_test_db();

        let id = db
            .transaction(|tx| tx.insert("users", &[("username", SqlValue::from("erin"))]))
            .unwrap();
        assert!(id > 0);

        let result: Result<()> = db.transaction(|tx| {
            tx.insert("users", &[("username", SqlValue::from("frank"))])?;
            Err(DbError::Query("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(!db.in_transaction().unwrap());
        assert!(db.fetch_one("SELECT * FROM users WHERE username = 'frank'", ()).unwrap().is_none());
    }

    #[test]
    fn test_quote_list() {
        let db = setup_test_db();
        assert_eq!(db.quote_list(&[SqlValue::from("a"), SqlValue::from("b")]).unwrap(), "'a','b'");
        assert_eq!(
            db.quote_list(&[SqlValue::from("it's"), SqlValue::from(3), SqlValue::Null]).unwrap(),
            "'it''s',3,NULL"
        );
        assert_eq!(db.quote_list(&[]).unwrap(), "");

        let list = db.quote_list(&[SqlValue::from("alice"), SqlValue::from("bob")]).unwrap();
        let rows = db
            .fetch_all(&format!("SELECT id FROM users WHERE username IN ({})", list), ())
            .unwrap();
        assert_eq!(rows.len(), 2);
    }
}

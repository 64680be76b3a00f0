//! Database client abstraction.
//!
//! [`DatabaseClient`] is the only seam through which the engine talks to a
//! database.  Everything above it (registry, status table, migrations) is
//! backend-agnostic and only ever hands it SQL text.

mod noop;
mod sqlite;

use std::path::Path;

pub use noop::NoopClient;
pub use sqlite::SqliteClient;

use crate::error::Result;

/// A loosely typed result record, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A connection that speaks SQL.
pub trait DatabaseClient {
    /// Run one or more statements that return no rows.
    fn execute(&self, sql: &str) -> Result<()>;

    /// Run a statement that returns zero or more rows.
    fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// First row of `query`, or `None` when there are no rows.
    fn single(&self, sql: &str) -> Result<Option<Row>> {
        Ok(self.query(sql)?.into_iter().next())
    }

    /// Open a transaction around one migration action.
    ///
    /// Backends without transactions keep the default no-op hooks, and a
    /// failed action then stays partially applied.
    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    /// Discard everything since [`begin`](Self::begin).
    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    /// Short human label for logs and CLI output.
    fn describe(&self) -> String;

    /// `false` when statements are only logged, never executed.
    fn is_live(&self) -> bool {
        true
    }
}

/// Build a client from optional configuration.
///
/// A missing database path is not an error: the returned client degrades to
/// [`NoopClient`], which logs intended statements instead of running them.
/// A configured path that cannot be opened is an error.
pub fn connect(database_path: Option<&Path>) -> Result<Box<dyn DatabaseClient>> {
    match database_path {
        Some(path) => Ok(Box::new(SqliteClient::open_at(path)?)),
        None => {
            tracing::warn!("no database configured, statements will be logged but not executed");
            Ok(Box::new(NoopClient::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_without_path_degrades_to_noop() {
        let client = connect(None).expect("missing config must not fail");
        assert!(!client.is_live());
        client.execute("CREATE TABLE t (id INTEGER)").unwrap();
        assert!(client.query("SELECT * FROM t").unwrap().is_empty());
    }

    #[test]
    fn connect_with_path_opens_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.db");

        let client = connect(Some(&path)).expect("should open");
        assert!(client.is_live());
        assert!(path.exists());
    }

    #[test]
    fn single_returns_none_for_empty_result() {
        let client = SqliteClient::open_in_memory().unwrap();
        client.execute("CREATE TABLE t (id INTEGER)").unwrap();

        assert!(client.single("SELECT id FROM t").unwrap().is_none());

        client.execute("INSERT INTO t VALUES (7); INSERT INTO t VALUES (8);").unwrap();
        let row = client.single("SELECT id FROM t ORDER BY id").unwrap().unwrap();
        assert_eq!(row["id"], 7);
    }
}

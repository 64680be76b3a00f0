//! SQLite-backed client.
//!
//! [`SqliteClient`] owns a [`rusqlite::Connection`].  Multi-statement scripts
//! are executed as a batch, so a migration can ship its whole schema change
//! as one string.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

use super::{DatabaseClient, Row};
use crate::error::{ClientError, Result};

/// Wrapper around a [`rusqlite::Connection`].
pub struct SqliteClient {
    conn: Connection,
}

impl SqliteClient {
    /// Open (or create) a database at an explicit path.
    ///
    /// The parent directory is created when missing.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;

        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

impl DatabaseClient for SqliteClient {
    fn execute(&self, sql: &str) -> Result<()> {
        tracing::debug!(sql, "execute");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        tracing::debug!(sql, "query");
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map([], |row| {
            let mut record = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), to_json(row.get_ref(idx)?));
            }
            Ok(record)
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(ClientError::Sqlite)
    }

    fn begin(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        // SQLite already rolled back on some errors (e.g. SQLITE_FULL).
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn describe(&self) -> String {
        match self.path() {
            Some(path) if !path.as_os_str().is_empty() => format!("sqlite:{}", path.display()),
            _ => "sqlite::memory:".to_string(),
        }
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let client = SqliteClient::open_at(&path).expect("should open");
        assert!(client.path().is_some());
        assert!(client.describe().starts_with("sqlite:"));
    }

    #[test]
    fn query_maps_column_types() {
        let client = SqliteClient::open_in_memory().unwrap();
        client
            .execute(
                "CREATE TABLE v (i INTEGER, r REAL, t TEXT, b BLOB, n TEXT);
                 INSERT INTO v VALUES (42, 1.5, 'hi', x'beef', NULL);",
            )
            .unwrap();

        let rows = client.query("SELECT i, r, t, b, n FROM v").unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["i"], 42);
        assert_eq!(row["r"], 1.5);
        assert_eq!(row["t"], "hi");
        assert_eq!(row["b"], "beef");
        assert!(row["n"].is_null());
    }

    #[test]
    fn rejected_statement_is_an_error() {
        let client = SqliteClient::open_in_memory().unwrap();
        let err = client.execute("CREATE TABL broken").unwrap_err();
        assert!(matches!(err, ClientError::Sqlite(_)));

        assert!(client.query("SELECT * FROM missing").is_err());
    }

    #[test]
    fn rollback_discards_partial_batch() {
        let client = SqliteClient::open_in_memory().unwrap();
        client.execute("CREATE TABLE t (id INTEGER);").unwrap();

        client.begin().unwrap();
        assert!(client
            .execute("ALTER TABLE t ADD COLUMN c INTEGER; CREATE TABL oops;")
            .is_err());
        client.rollback().unwrap();

        assert!(client.conn().is_autocommit());
        assert_eq!(client.query("PRAGMA table_info(t)").unwrap().len(), 1);

        // Nothing open: rollback is a no-op.
        client.rollback().unwrap();
    }

    #[test]
    fn commit_keeps_changes() {
        let client = SqliteClient::open_in_memory().unwrap();
        client.begin().unwrap();
        client.execute("CREATE TABLE t (id INTEGER);").unwrap();
        client.commit().unwrap();

        assert!(client.query("SELECT * FROM t").unwrap().is_empty());
    }
}

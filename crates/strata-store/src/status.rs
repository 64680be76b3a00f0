//! Status table persistence.
//!
//! One row per applied migration, keyed by migration id.  Writes are upserts
//! (re-applying a migration refreshes its row) and rollbacks delete the row.
//! The table is created by the bootstrap migration, which the registry always
//! runs first.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{DatabaseClient, Row};
use crate::error::{Result, StatusError};
use crate::migration::Migration;

/// Default name of the status table.
pub const DEFAULT_STATUS_TABLE: &str = "schema_migrations";

/// Id of the migration that creates the status table.
pub const BOOTSTRAP_ID: &str = "000_schema_migrations";

/// Version of the bootstrap migration.  Application migrations start at 1.
pub const BOOTSTRAP_VERSION: i64 = 0;

/// A persisted status row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationStatus {
    pub id: String,
    pub version: i64,
    pub name: String,
    /// `None` when the stored timestamp could not be parsed.
    pub applied_at: Option<DateTime<Utc>>,
    /// Checksum that was in effect when the migration was applied.
    pub checksum: String,
}

/// Reads and writes the status table through a [`DatabaseClient`].
#[derive(Debug, Clone)]
pub struct StatusStore {
    table: String,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self {
            table: DEFAULT_STATUS_TABLE.to_string(),
        }
    }
}

impl StatusStore {
    /// Use a custom table name.  Only ASCII letters, digits and `_` are
    /// accepted since the name is interpolated into SQL.
    pub fn new(table: impl Into<String>) -> Result<Self, StatusError> {
        let table = table.into();
        let valid = !table.is_empty()
            && !table.starts_with(|c: char| c.is_ascii_digit())
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(StatusError::InvalidTable(table));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id         TEXT PRIMARY KEY NOT NULL,\n    \
                version    INTEGER NOT NULL,\n    \
                name       TEXT NOT NULL,\n    \
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,\n    \
                checksum   TEXT NOT NULL\n\
            );",
            self.table
        )
    }

    /// The migration that creates this store's table.
    pub fn bootstrap_migration(&self) -> Migration {
        let create_sql = self.create_table_sql();
        let drop_sql = format!("DROP TABLE IF EXISTS {};", self.table);
        let checksum = crate::migration::checksum_of(&[&create_sql, &drop_sql]);

        Migration::new(
            BOOTSTRAP_ID,
            BOOTSTRAP_VERSION,
            "create migration status table",
            checksum,
            move |db: &dyn DatabaseClient| db.execute(&create_sql),
            move |db: &dyn DatabaseClient| db.execute(&drop_sql),
        )
    }

    /// All status rows, ascending by version.
    ///
    /// Fails when the table is missing; callers that need first-run
    /// tolerance treat that as an empty result.
    pub fn read_all(&self, db: &dyn DatabaseClient) -> Result<Vec<MigrationStatus>, StatusError> {
        let rows = db
            .query(&format!(
                "SELECT id, version, name, applied_at, checksum FROM {} ORDER BY version ASC",
                self.table
            ))
            .map_err(StatusError::Read)?;

        Ok(rows.iter().filter_map(parse_row).collect())
    }

    /// Insert or refresh the row for `migration`.
    pub fn mark_applied(
        &self,
        db: &dyn DatabaseClient,
        migration: &Migration,
        at: DateTime<Utc>,
    ) -> Result<(), StatusError> {
        let sql = format!(
            "INSERT INTO {table} (id, version, name, applied_at, checksum) \
             VALUES ({id}, {version}, {name}, {at}, {checksum}) \
             ON CONFLICT (id) DO UPDATE SET \
             version = excluded.version, name = excluded.name, \
             applied_at = excluded.applied_at, checksum = excluded.checksum;",
            table = self.table,
            id = quote_literal(migration.id()),
            version = migration.version(),
            name = quote_literal(migration.name()),
            at = quote_literal(&at.to_rfc3339()),
            checksum = quote_literal(migration.checksum()),
        );

        db.execute(&sql).map_err(|source| StatusError::Write {
            id: migration.id().to_string(),
            source,
        })
    }

    /// Delete the row for `id`.
    pub fn mark_rolled_back(&self, db: &dyn DatabaseClient, id: &str) -> Result<(), StatusError> {
        let sql = format!("DELETE FROM {} WHERE id = {};", self.table, quote_literal(id));
        db.execute(&sql).map_err(|source| StatusError::Write {
            id: id.to_string(),
            source,
        })
    }
}

/// Single-quote a SQL text literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn parse_row(row: &Row) -> Option<MigrationStatus> {
    let id = row.get("id").and_then(Value::as_str);
    let version = row.get("version").and_then(as_i64);

    let (Some(id), Some(version)) = (id, version) else {
        tracing::warn!(?row, "skipping malformed status row");
        return None;
    };

    let applied_at = row.get("applied_at").and_then(Value::as_str).and_then(parse_timestamp);
    if applied_at.is_none() {
        tracing::warn!(id, "status row has an unreadable applied_at");
    }

    Some(MigrationStatus {
        id: id.to_string(),
        version,
        name: text(row, "name"),
        applied_at,
        checksum: text(row, "checksum"),
    })
}

// Some backends hand integers back as text.
fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn text(row: &Row, column: &str) -> String {
    row.get(column)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQL CURRENT_TIMESTAMP format.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SqliteClient;

    fn migration(id: &str, version: i64, checksum: &str) -> Migration {
        Migration::new(
            id,
            version,
            format!("migration {id}"),
            checksum,
            |_: &dyn DatabaseClient| Ok(()),
            |_: &dyn DatabaseClient| Ok(()),
        )
    }

    fn bootstrapped() -> (SqliteClient, StatusStore) {
        let db = SqliteClient::open_in_memory().unwrap();
        let store = StatusStore::default();
        store.bootstrap_migration().run_up(&db).unwrap();
        (db, store)
    }

    #[test]
    fn rejects_unsafe_table_names() {
        assert!(StatusStore::new("schema_migrations").is_ok());
        assert!(StatusStore::new("app_v2_migrations").is_ok());
        assert!(StatusStore::new("").is_err());
        assert!(StatusStore::new("1table").is_err());
        assert!(StatusStore::new("x; DROP TABLE users").is_err());
    }

    #[test]
    fn read_fails_before_bootstrap() {
        let db = SqliteClient::open_in_memory().unwrap();
        let err = StatusStore::default().read_all(&db).unwrap_err();
        assert!(matches!(err, StatusError::Read(_)));
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let (db, store) = bootstrapped();
        store.bootstrap_migration().run_up(&db).unwrap();
        assert!(store.read_all(&db).unwrap().is_empty());
    }

    #[test]
    fn mark_applied_upserts() {
        let (db, store) = bootstrapped();
        let t1 = Utc::now();

        store.mark_applied(&db, &migration("001", 1, "aaa"), t1).unwrap();
        store.mark_applied(&db, &migration("001", 1, "bbb"), t1).unwrap();

        let rows = store.read_all(&db).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "001");
        assert_eq!(rows[0].checksum, "bbb");
        assert_eq!(rows[0].name, "migration 001");
        assert_eq!(
            rows[0].applied_at.map(|t| t.timestamp()),
            Some(t1.timestamp())
        );
    }

    #[test]
    fn mark_rolled_back_deletes_only_that_row() {
        let (db, store) = bootstrapped();
        store.mark_applied(&db, &migration("001", 1, "a"), Utc::now()).unwrap();
        store.mark_applied(&db, &migration("002", 2, "b"), Utc::now()).unwrap();

        store.mark_rolled_back(&db, "002").unwrap();

        let ids: Vec<_> = store.read_all(&db).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["001"]);
    }

    #[test]
    fn quotes_are_escaped() {
        let (db, store) = bootstrapped();
        let m = migration("it's", 3, "o'clock");
        store.mark_applied(&db, &m, Utc::now()).unwrap();

        let rows = store.read_all(&db).unwrap();
        assert_eq!(rows[0].id, "it's");
        assert_eq!(quote_literal("a'b"), "'a''b'");
    }

    #[test]
    fn default_timestamp_is_parsed() {
        let (db, store) = bootstrapped();
        db.execute(
            "INSERT INTO schema_migrations (id, version, name, checksum) VALUES ('x', 9, 'x', 'c');",
        )
        .unwrap();

        let rows = store.read_all(&db).unwrap();
        assert!(rows[0].applied_at.is_some());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let mut bad = Row::new();
        bad.insert("id".into(), Value::Null);
        bad.insert("version".into(), Value::from(1));
        assert!(parse_row(&bad).is_none());

        let mut textual = Row::new();
        textual.insert("id".into(), Value::from("001"));
        textual.insert("version".into(), Value::from("12"));
        textual.insert("applied_at".into(), Value::from("not a date"));
        let parsed = parse_row(&textual).unwrap();
        assert_eq!(parsed.version, 12);
        assert!(parsed.applied_at.is_none());
        assert_eq!(parsed.checksum, "");
    }
}

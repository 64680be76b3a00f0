use thiserror::Error;

/// Errors produced by a [`DatabaseClient`](crate::client::DatabaseClient).
///
/// Any variant returned from a migration's forward or reverse action is an
/// execution failure and aborts the running batch.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The backend rejected a statement, or an action reported failure.
    #[error("Execution error: {0}")]
    Execution(String),

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while reading or writing the status table.
///
/// These never abort a migration run: reads degrade to "nothing applied" and
/// writes are logged and reported as unrecorded.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Could not read status table: {0}")]
    Read(#[source] ClientError),

    #[error("Could not record status for migration {id}: {source}")]
    Write {
        id: String,
        #[source]
        source: ClientError,
    },

    #[error("Invalid status table name: {0:?}")]
    InvalidTable(String),
}

/// Errors produced by the [`MigrationRegistry`](crate::registry::MigrationRegistry).
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A forward or reverse action failed; the rest of the batch was skipped.
    #[error("Migration {id} ({name}, version {version}) failed: {source}")]
    Execution {
        id: String,
        name: String,
        version: i64,
        #[source]
        source: ClientError,
    },

    #[error("Migration id {0} is already registered")]
    DuplicateId(String),

    #[error("Migration {id} uses reserved version {version} (application versions start at 1)")]
    ReservedVersion { id: String, version: i64 },

    /// An applied status row has no registered definition to roll back with.
    #[error("Applied migration {0} has no registered definition")]
    UnknownMigration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

//! # strata-store
//!
//! Schema migration engine for relational databases.
//!
//! Migrations are registered once per process in a [`MigrationRegistry`],
//! diffed against a persisted status table, and applied (or rolled back) one
//! at a time through a backend-agnostic [`DatabaseClient`].  The engine never
//! assumes anything about the SQL a migration runs; it only owns ordering,
//! change detection and bookkeeping.

pub mod client;
pub mod migration;
pub mod registry;
pub mod status;

mod error;

pub use client::{connect, DatabaseClient, NoopClient, Row, SqliteClient};
pub use error::{ClientError, RegistryError, StatusError};
pub use migration::{checksum_of, Action, Migration};
pub use registry::{
    AppliedMigration, MigrateReport, MigrationRegistry, PendingMigration, PendingReason,
    RollbackReport,
};
pub use status::{MigrationStatus, StatusStore, BOOTSTRAP_ID, DEFAULT_STATUS_TABLE};

//! Migration registry and runner.
//!
//! The [`MigrationRegistry`] owns the in-memory catalog, diffs it against the
//! status table and drives forward and reverse runs.  Each action runs in its
//! own transaction, so a failing action leaves nothing half-applied.  Runs are
//! fail-fast: the first failing action stops the batch and earlier successes
//! stay applied.
//! Status bookkeeping is lenient: a failed status write is logged and
//! reported, never fatal.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;

use crate::client::DatabaseClient;
use crate::error::{ClientError, RegistryError, Result};
use crate::migration::Migration;
use crate::status::{MigrationStatus, StatusStore, BOOTSTRAP_ID, BOOTSTRAP_VERSION};

struct Entry {
    // Registration order, used to break version ties.
    seq: u64,
    migration: Migration,
}

/// Why a migration is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingReason {
    /// Never applied.
    New,
    /// Applied with a different checksum; the definition changed.
    ChecksumChanged { recorded: String },
}

#[derive(Debug, Clone)]
pub struct PendingMigration<'a> {
    pub migration: &'a Migration,
    pub reason: PendingReason,
}

/// A migration touched by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub id: String,
    pub version: i64,
    pub name: String,
}

impl From<&Migration> for AppliedMigration {
    fn from(m: &Migration) -> Self {
        Self {
            id: m.id().to_string(),
            version: m.version(),
            name: m.name().to_string(),
        }
    }
}

/// Outcome of [`MigrationRegistry::migrate`] and [`MigrationRegistry::dry_run`].
#[derive(Debug, Default, Clone, Serialize)]
pub struct MigrateReport {
    /// Migrations whose forward action succeeded (or would run, for a dry run).
    pub applied: Vec<AppliedMigration>,
    /// Ids whose action succeeded but whose status row could not be written.
    pub unrecorded: Vec<String>,
}

impl MigrateReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Outcome of [`MigrationRegistry::rollback`].
#[derive(Debug, Default, Clone, Serialize)]
pub struct RollbackReport {
    pub rolled_back: Vec<AppliedMigration>,
    /// Ids whose reverse action succeeded but whose status row could not be removed.
    pub unrecorded: Vec<String>,
}

/// In-memory catalog of migrations.
pub struct MigrationRegistry {
    entries: HashMap<String, Entry>,
    next_seq: u64,
    status: StatusStore,
}

impl MigrationRegistry {
    /// Create a registry holding only the bootstrap migration for `status`.
    pub fn new(status: StatusStore) -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
            next_seq: 0,
            status,
        };
        let bootstrap = registry.status.bootstrap_migration();
        registry.register(bootstrap);
        registry
    }

    pub fn status_store(&self) -> &StatusStore {
        &self.status
    }

    /// Register `migration`, replacing any earlier one with the same id.
    pub fn register(&mut self, migration: Migration) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let id = migration.id().to_string();
        if let Some(previous) = self.entries.insert(id, Entry { seq, migration }) {
            tracing::warn!(
                id = previous.migration.id(),
                "migration registered twice, keeping the later definition"
            );
        }
    }

    /// Register `migration`, rejecting duplicate ids and reserved versions.
    pub fn try_register(&mut self, migration: Migration) -> Result<(), RegistryError> {
        if self.entries.contains_key(migration.id()) {
            return Err(RegistryError::DuplicateId(migration.id().to_string()));
        }
        if migration.version() <= BOOTSTRAP_VERSION {
            return Err(RegistryError::ReservedVersion {
                id: migration.id().to_string(),
                version: migration.version(),
            });
        }
        self.register(migration);
        Ok(())
    }

    /// Number of registered migrations, bootstrap included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Migration> {
        self.entries.get(id).map(|e| &e.migration)
    }

    /// All migrations, ascending by version, ties in registration order.
    pub fn get_all(&self) -> Vec<&Migration> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| (e.migration.version(), e.seq));
        entries.into_iter().map(|e| &e.migration).collect()
    }

    /// Status rows, or nothing when the status table cannot be read.
    pub fn get_applied_migrations(&self, db: &dyn DatabaseClient) -> Vec<MigrationStatus> {
        match self.status.read_all(db) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::debug!(error = %e, "status table unreadable, assuming nothing applied");
                Vec::new()
            }
        }
    }

    /// Pending migrations with the reason each one is pending.
    pub fn plan(&self, db: &dyn DatabaseClient) -> Vec<PendingMigration<'_>> {
        let applied: HashMap<String, String> = self
            .get_applied_migrations(db)
            .into_iter()
            .map(|row| (row.id, row.checksum))
            .collect();

        self.get_all()
            .into_iter()
            .filter_map(|migration| {
                let reason = match applied.get(migration.id()) {
                    None => PendingReason::New,
                    Some(recorded) if recorded != migration.checksum() => {
                        PendingReason::ChecksumChanged {
                            recorded: recorded.clone(),
                        }
                    }
                    Some(_) => return None,
                };
                Some(PendingMigration { migration, reason })
            })
            .collect()
    }

    pub fn get_pending(&self, db: &dyn DatabaseClient) -> Vec<&Migration> {
        self.plan(db).into_iter().map(|p| p.migration).collect()
    }

    /// Apply every pending migration in order, stopping at the first failure.
    pub fn migrate(&self, db: &dyn DatabaseClient) -> Result<MigrateReport, RegistryError> {
        let pending = self.plan(db);
        let mut report = MigrateReport::default();

        if pending.is_empty() {
            tracing::info!("database is up to date, nothing to migrate");
            return Ok(report);
        }

        tracing::info!(count = pending.len(), "applying pending migrations");

        for PendingMigration { migration, reason } in pending {
            if let PendingReason::ChecksumChanged { recorded } = &reason {
                tracing::warn!(
                    id = migration.id(),
                    recorded = %recorded,
                    current = migration.checksum(),
                    "migration changed since it was applied, re-applying"
                );
            }

            tracing::info!(
                id = migration.id(),
                version = migration.version(),
                name = migration.name(),
                "applying migration"
            );
            in_transaction(db, migration, |db| migration.run_up(db))?;

            if let Err(e) = self.status.mark_applied(db, migration, Utc::now()) {
                tracing::warn!(error = %e, "migration applied but its status row was not written");
                report.unrecorded.push(migration.id().to_string());
            }
            report.applied.push(migration.into());
        }

        tracing::info!(applied = report.applied.len(), "migrations complete");
        Ok(report)
    }

    /// What [`migrate`](Self::migrate) would apply, without running anything.
    pub fn dry_run(&self, db: &dyn DatabaseClient) -> MigrateReport {
        MigrateReport {
            applied: self
                .plan(db)
                .into_iter()
                .map(|p| p.migration.into())
                .collect(),
            unrecorded: Vec::new(),
        }
    }

    /// Revert every applied migration with a version above `target_version`,
    /// newest first, stopping at the first failure.
    pub fn rollback(
        &self,
        target_version: i64,
        db: &dyn DatabaseClient,
    ) -> Result<RollbackReport, RegistryError> {
        let seq_of = |id: &str| self.entries.get(id).map_or(0, |e| e.seq);

        let mut targets: Vec<MigrationStatus> = self
            .get_applied_migrations(db)
            .into_iter()
            .filter(|row| row.version > target_version)
            .collect();
        targets.sort_by(|a, b| {
            (b.version, seq_of(&b.id)).cmp(&(a.version, seq_of(&a.id)))
        });

        let mut report = RollbackReport::default();
        if targets.is_empty() {
            tracing::info!(target_version, "nothing to roll back");
            return Ok(report);
        }

        for row in targets {
            let migration = self
                .get(&row.id)
                .ok_or_else(|| RegistryError::UnknownMigration(row.id.clone()))?;

            tracing::info!(
                id = migration.id(),
                version = row.version,
                name = migration.name(),
                "rolling back migration"
            );
            in_transaction(db, migration, |db| migration.run_down(db))?;

            // Reverting the bootstrap migration drops the table holding its row.
            if row.id != BOOTSTRAP_ID {
                if let Err(e) = self.status.mark_rolled_back(db, &row.id) {
                    tracing::warn!(error = %e, "migration reverted but its status row was not removed");
                    report.unrecorded.push(row.id.clone());
                }
            }

            report.rolled_back.push(AppliedMigration {
                id: row.id,
                version: row.version,
                name: migration.name().to_string(),
            });
        }

        Ok(report)
    }
}

/// Run one action between `begin` and `commit`, rolling back on failure.
/// The status write happens afterwards, outside the transaction.
fn in_transaction(
    db: &dyn DatabaseClient,
    migration: &Migration,
    action: impl FnOnce(&dyn DatabaseClient) -> Result<()>,
) -> Result<(), RegistryError> {
    db.begin().map_err(|source| execution_failed(migration, source))?;

    match action(db).and_then(|()| db.commit()) {
        Ok(()) => Ok(()),
        Err(source) => {
            if let Err(e) = db.rollback() {
                tracing::warn!(
                    id = migration.id(),
                    error = %e,
                    "could not roll back failed migration"
                );
            }
            Err(execution_failed(migration, source))
        }
    }
}

fn execution_failed(migration: &Migration, source: ClientError) -> RegistryError {
    tracing::error!(
        id = migration.id(),
        version = migration.version(),
        error = %source,
        "migration failed, aborting remaining migrations"
    );
    RegistryError::Execution {
        id: migration.id().to_string(),
        name: migration.name().to_string(),
        version: migration.version(),
        source,
    }
}

//! Command handlers.
//!
//! Each handler builds the registry, connects, calls one registry operation
//! and renders the result.  Human output goes to stdout; logs go to stderr.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Serialize;
use strata_store::{
    DatabaseClient, MigrateReport, MigrationRegistry, MigrationStatus, PendingReason,
    RollbackReport,
};

use crate::catalog;
use crate::config::CliConfig;
use crate::create;

pub fn migrate(config: &CliConfig, dry_run: bool) -> Result<()> {
    let registry = catalog::build_registry(config.status_store())?;
    let db = connect(config)?;

    if dry_run {
        let report = registry.dry_run(db.as_ref());
        print_migrate(&report, true);
        return Ok(());
    }

    let report = registry
        .migrate(db.as_ref())
        .context("migration run aborted, earlier migrations remain applied")?;
    print_migrate(&report, false);
    Ok(())
}

pub fn rollback(config: &CliConfig, target_version: i64) -> Result<()> {
    let registry = catalog::build_registry(config.status_store())?;
    let db = connect(config)?;

    let report = registry
        .rollback(target_version, db.as_ref())
        .with_context(|| format!("rollback to version {target_version} aborted"))?;
    print_rollback(&report, target_version);
    Ok(())
}

/// Read-only; failures are reported but never turn into a non-zero exit.
pub fn status(config: &CliConfig, json: bool) -> Result<()> {
    match collect_status(config) {
        Ok(summary) if json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Ok(summary) => print_status(&summary),
        Err(e) => {
            tracing::error!(error = %e, "could not collect migration status");
            println!("Status unavailable: {e:#}");
        }
    }
    Ok(())
}

pub fn create(config: &CliConfig, name: &str) -> Result<()> {
    let path = create::create_migration(&config.migrations_dir, name)?;
    println!("Created migration: {}", path.display());
    println!("Declare the module in catalog/mod.rs and add its migration() to build_registry.");
    Ok(())
}

fn connect(config: &CliConfig) -> Result<Box<dyn DatabaseClient>> {
    let db = strata_store::connect(config.database_path.as_deref())
        .context("failed to open database")?;

    if !db.is_live() {
        eprintln!("!! No database configured (set STRATA_DATABASE_PATH).");
        eprintln!("!! Statements are logged, not executed, and nothing is recorded.");
    }
    Ok(db)
}

#[derive(Debug, Serialize)]
struct StatusSummary {
    backend: String,
    live: bool,
    registered: usize,
    applied: Vec<MigrationStatus>,
    pending: Vec<PendingEntry>,
    /// Applied ids with no registered definition.
    orphaned: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PendingEntry {
    id: String,
    version: i64,
    name: String,
    reason: PendingReason,
}

fn collect_status(config: &CliConfig) -> Result<StatusSummary> {
    let registry = catalog::build_registry(config.status_store())?;
    let db = connect(config)?;
    Ok(summarize(&registry, db.as_ref()))
}

fn summarize(registry: &MigrationRegistry, db: &dyn DatabaseClient) -> StatusSummary {
    let registered = registry.get_all();
    let known: HashSet<&str> = registered.iter().map(|m| m.id()).collect();
    let applied = registry.get_applied_migrations(db);

    let orphaned = applied
        .iter()
        .filter(|row| !known.contains(row.id.as_str()))
        .map(|row| row.id.clone())
        .collect();

    let pending = registry
        .plan(db)
        .into_iter()
        .map(|p| PendingEntry {
            id: p.migration.id().to_string(),
            version: p.migration.version(),
            name: p.migration.name().to_string(),
            reason: p.reason,
        })
        .collect();

    StatusSummary {
        backend: db.describe(),
        live: db.is_live(),
        registered: registered.len(),
        applied,
        pending,
        orphaned,
    }
}

fn print_status(summary: &StatusSummary) {
    println!("Database:   {}", summary.backend);
    println!(
        "Registered: {}   Applied: {}   Pending: {}",
        summary.registered,
        summary.applied.len(),
        summary.pending.len()
    );

    if !summary.applied.is_empty() {
        println!("\nApplied:");
        for row in &summary.applied {
            let at = row
                .applied_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  [{:>4}] {:<32} {}  ({at})", row.version, row.id, row.name);
        }
    }

    if !summary.pending.is_empty() {
        println!("\nPending:");
        for entry in &summary.pending {
            let reason = match &entry.reason {
                PendingReason::New => "new",
                PendingReason::ChecksumChanged { .. } => "changed since applied",
            };
            println!(
                "  [{:>4}] {:<32} {}  ({reason})",
                entry.version, entry.id, entry.name
            );
        }
    }

    if !summary.orphaned.is_empty() {
        println!("\nApplied but no longer registered:");
        for id in &summary.orphaned {
            println!("  {id}");
        }
    }
}

fn print_migrate(report: &MigrateReport, dry_run: bool) {
    if report.is_noop() {
        println!("Nothing to migrate, database is up to date.");
        return;
    }

    let verb = if dry_run { "Would apply" } else { "Applied" };
    println!("{verb} {} migration(s):", report.applied.len());
    for m in &report.applied {
        println!("  [{:>4}] {} - {}", m.version, m.id, m.name);
    }
    print_unrecorded(&report.unrecorded);
}

fn print_rollback(report: &RollbackReport, target_version: i64) {
    if report.rolled_back.is_empty() {
        println!("Nothing to roll back above version {target_version}.");
        return;
    }

    println!("Rolled back {} migration(s):", report.rolled_back.len());
    for m in &report.rolled_back {
        println!("  [{:>4}] {} - {}", m.version, m.id, m.name);
    }
    print_unrecorded(&report.unrecorded);
}

fn print_unrecorded(ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    println!("Warning: the status table could not be updated for:");
    for id in ids {
        println!("  {id}");
    }
}

#[cfg(test)]
mod tests {
    use strata_store::{Migration, SqliteClient, StatusStore, BOOTSTRAP_ID};

    use super::*;

    const UP_A: &str = "CREATE TABLE a (id INTEGER);";
    const UP_A_CHANGED: &str = "CREATE TABLE a (id INTEGER, label TEXT);";
    const DOWN_A: &str = "DROP TABLE a;";
    const UP_B: &str = "CREATE TABLE IF NOT EXISTS b (id INTEGER);";
    const DOWN_B: &str = "DROP TABLE IF EXISTS b;";

    #[test]
    fn summary_reports_pending_and_orphans() {
        let db = SqliteClient::open_in_memory().unwrap();

        let mut old = MigrationRegistry::new(StatusStore::default());
        old.register(Migration::from_sql("001_a", 1, "a", UP_A, DOWN_A));
        old.register(Migration::from_sql("002_gone", 2, "gone", UP_B, DOWN_B));
        old.migrate(&db).unwrap();

        let mut current = MigrationRegistry::new(StatusStore::default());
        current.register(Migration::from_sql("001_a", 1, "a", UP_A_CHANGED, DOWN_A));
        current.register(Migration::from_sql("003_new", 3, "new", UP_B, DOWN_B));

        let summary = summarize(&current, &db);

        assert!(summary.live);
        assert_eq!(summary.registered, 3);
        assert_eq!(summary.applied.len(), 3);
        assert_eq!(summary.orphaned, vec!["002_gone"]);

        let pending: Vec<_> = summary.pending.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(pending, vec!["001_a", "003_new"]);
        assert!(matches!(
            summary.pending[0].reason,
            PendingReason::ChecksumChanged { .. }
        ));
        assert_eq!(summary.pending[1].reason, PendingReason::New);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["pending"][1]["reason"]["kind"], "new");
        assert_eq!(json["applied"][0]["id"], BOOTSTRAP_ID);
    }

    fn file_config(dir: &tempfile::TempDir) -> CliConfig {
        CliConfig {
            database_path: Some(dir.path().join("app.db")),
            ..CliConfig::default()
        }
    }

    fn open(config: &CliConfig) -> SqliteClient {
        SqliteClient::open_at(config.database_path.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn migrate_twice_succeeds_and_second_run_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);

        migrate(&config, false).unwrap();
        migrate(&config, false).unwrap();

        let registry = catalog::build_registry(config.status_store()).unwrap();
        let db = open(&config);
        assert!(registry.get_pending(&db).is_empty());
        assert_eq!(registry.get_applied_migrations(&db).len(), registry.len());
    }

    #[test]
    fn migrate_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);

        // A pre-existing table without `email` breaks the profiles index.
        open(&config)
            .execute("CREATE TABLE profiles (id TEXT PRIMARY KEY);")
            .unwrap();

        assert!(migrate(&config, false).is_err());

        let registry = catalog::build_registry(config.status_store()).unwrap();
        let applied: Vec<_> = registry
            .get_applied_migrations(&open(&config))
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(applied, vec![BOOTSTRAP_ID]);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);

        migrate(&config, true).unwrap();

        let registry = catalog::build_registry(config.status_store()).unwrap();
        assert!(registry.get_applied_migrations(&open(&config)).is_empty());
    }

    #[test]
    fn rollback_succeeds_then_fails_on_unknown_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        migrate(&config, false).unwrap();

        rollback(&config, 1).unwrap();
        let registry = catalog::build_registry(config.status_store()).unwrap();
        let db = open(&config);
        assert_eq!(registry.get_applied_migrations(&db).len(), 2);

        let gone = Migration::from_sql("099_gone", 99, "gone", UP_B, DOWN_B);
        StatusStore::default()
            .mark_applied(&db, &gone, chrono::Utc::now())
            .unwrap();
        drop(db);

        assert!(rollback(&config, 1).is_err());
    }

    #[test]
    fn summary_on_noop_client_lists_everything_pending() {
        let db = strata_store::NoopClient::new();
        let registry = catalog::build_registry(StatusStore::default()).unwrap();

        let summary = summarize(&registry, &db);

        assert!(!summary.live);
        assert!(summary.applied.is_empty());
        assert_eq!(summary.pending.len(), registry.len());
    }
}

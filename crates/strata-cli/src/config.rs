//! CLI configuration loaded from environment variables.
//!
//! Every setting has a default, and a missing database path is not an
//! error: the engine then runs against the no-op client.

use std::path::PathBuf;

use strata_store::{StatusStore, DEFAULT_STATUS_TABLE};

/// Default directory for `strata create`.
pub const DEFAULT_MIGRATIONS_DIR: &str = "crates/strata-cli/src/catalog";

#[derive(Debug, Clone)]
pub struct CliConfig {
    /// SQLite database file.
    /// Env: `STRATA_DATABASE_PATH`
    /// Default: unset (no-op mode).
    pub database_path: Option<PathBuf>,

    /// Name of the migration status table.
    /// Env: `STRATA_STATUS_TABLE`
    /// Default: `schema_migrations`
    pub status_table: String,

    /// Directory where `strata create` writes new migration modules.
    /// Env: `STRATA_MIGRATIONS_DIR`
    /// Default: `crates/strata-cli/src/catalog`
    pub migrations_dir: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            status_table: DEFAULT_STATUS_TABLE.to_string(),
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
        }
    }
}

impl CliConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("STRATA_DATABASE_PATH") {
            let path = path.trim();
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(table) = lookup("STRATA_STATUS_TABLE") {
            match StatusStore::new(table.trim()) {
                Ok(_) => config.status_table = table.trim().to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid STRATA_STATUS_TABLE, using default");
                }
            }
        }

        if let Some(dir) = lookup("STRATA_MIGRATIONS_DIR") {
            if !dir.trim().is_empty() {
                config.migrations_dir = PathBuf::from(dir.trim());
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    pub fn status_store(&self) -> StatusStore {
        StatusStore::new(self.status_table.as_str()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> CliConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = from_pairs(&[]);
        assert!(config.database_path.is_none());
        assert_eq!(config.status_table, "schema_migrations");
        assert_eq!(config.migrations_dir, PathBuf::from(DEFAULT_MIGRATIONS_DIR));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("STRATA_DATABASE_PATH", "/var/lib/app/app.db"),
            ("STRATA_STATUS_TABLE", "app_migrations"),
            ("STRATA_MIGRATIONS_DIR", "db/migrations"),
        ]);
        assert_eq!(config.database_path, Some(PathBuf::from("/var/lib/app/app.db")));
        assert_eq!(config.status_store().table(), "app_migrations");
        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
    }

    #[test]
    fn test_blank_database_path_means_noop() {
        let config = from_pairs(&[("STRATA_DATABASE_PATH", "   ")]);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_invalid_status_table_falls_back() {
        let config = from_pairs(&[("STRATA_STATUS_TABLE", "drop table;")]);
        assert_eq!(config.status_table, "schema_migrations");
    }
}

use super::{DatabaseClient, Row};
use crate::error::Result;

/// Degraded client used when no database is configured.
///
/// Every statement is logged and reported as successful; queries return no
/// rows.  Since the status table always reads as empty, every migration
/// looks pending on each run.
#[derive(Debug, Default)]
pub struct NoopClient;

impl NoopClient {
    pub fn new() -> Self {
        Self
    }
}

impl DatabaseClient for NoopClient {
    fn execute(&self, sql: &str) -> Result<()> {
        tracing::info!(sql = sql.trim(), "[no-op] would execute");
        Ok(())
    }

    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        tracing::info!(sql = sql.trim(), "[no-op] would query");
        Ok(Vec::new())
    }

    fn describe(&self) -> String {
        "no-op (no database configured)".to_string()
    }

    fn is_live(&self) -> bool {
        false
    }
}

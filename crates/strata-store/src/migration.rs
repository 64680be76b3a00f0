//! Migration definitions.
//!
//! A [`Migration`] is an immutable, versioned pair of forward/reverse actions
//! plus a checksum of its intended effect.  Most migrations are plain SQL
//! scripts ([`Migration::from_sql`]); anything that needs to inspect data
//! first can be written as a closure ([`Migration::new`]).

use std::fmt;
use std::sync::Arc;

use crate::client::DatabaseClient;
use crate::error::Result;

/// A forward or reverse migration action.
pub type Action = Arc<dyn Fn(&dyn DatabaseClient) -> Result<()> + Send + Sync>;

/// A single schema migration.
#[derive(Clone)]
pub struct Migration {
    id: String,
    version: i64,
    name: String,
    checksum: String,
    up: Action,
    down: Action,
}

impl Migration {
    /// Build a migration from arbitrary actions.
    ///
    /// The checksum must change whenever the intended effect of `up` changes,
    /// otherwise an already-applied migration will not be re-run.
    pub fn new<U, D>(
        id: impl Into<String>,
        version: i64,
        name: impl Into<String>,
        checksum: impl Into<String>,
        up: U,
        down: D,
    ) -> Self
    where
        U: Fn(&dyn DatabaseClient) -> Result<()> + Send + Sync + 'static,
        D: Fn(&dyn DatabaseClient) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            version,
            name: name.into(),
            checksum: checksum.into(),
            up: Arc::new(up),
            down: Arc::new(down),
        }
    }

    /// Build a migration whose actions are SQL scripts.
    ///
    /// The checksum covers both scripts, so editing either one marks the
    /// migration as pending again.
    pub fn from_sql(
        id: impl Into<String>,
        version: i64,
        name: impl Into<String>,
        up_sql: &'static str,
        down_sql: &'static str,
    ) -> Self {
        let checksum = checksum_of(&[up_sql, down_sql]);
        Self::new(
            id,
            version,
            name,
            checksum,
            move |db: &dyn DatabaseClient| db.execute(up_sql),
            move |db: &dyn DatabaseClient| db.execute(down_sql),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Run the forward action.
    pub fn run_up(&self, db: &dyn DatabaseClient) -> Result<()> {
        (self.up)(db)
    }

    /// Run the reverse action.
    pub fn run_down(&self, db: &dyn DatabaseClient) -> Result<()> {
        (self.down)(db)
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("name", &self.name)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

/// BLAKE3 fingerprint of `parts`, NUL-separated, as lowercase hex.
pub fn checksum_of(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(&[0]);
        }
        hasher.update(part.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

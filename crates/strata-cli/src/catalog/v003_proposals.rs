use strata_store::Migration;

pub const ID: &str = "003_proposals";
pub const VERSION: i64 = 3;

const UP_SQL: &str = r#"
-- Proposals submitted against a project
CREATE TABLE IF NOT EXISTS proposals (
    id          TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    project_id  TEXT NOT NULL,                 -- FK -> projects(id)
    author_id   TEXT NOT NULL,                 -- FK -> profiles(id)
    amount      REAL,
    status      TEXT NOT NULL DEFAULT 'pending',
    created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,

    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_proposals_project ON proposals(project_id, created_at DESC);
CREATE UNIQUE INDEX IF NOT EXISTS idx_proposals_unique ON proposals(project_id, author_id);
"#;

const DOWN_SQL: &str = r#"
DROP INDEX IF EXISTS idx_proposals_unique;
DROP INDEX IF EXISTS idx_proposals_project;
DROP TABLE IF EXISTS proposals;
"#;

pub fn migration() -> Migration {
    Migration::from_sql(ID, VERSION, "create proposals", UP_SQL, DOWN_SQL)
}

use strata_store::Migration;

pub const ID: &str = "002_projects";
pub const VERSION: i64 = 2;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id          TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    owner_id    TEXT NOT NULL,                 -- FK -> profiles(id)
    title       TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,

    FOREIGN KEY (owner_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);
"#;

const DOWN_SQL: &str = r#"
DROP INDEX IF EXISTS idx_projects_owner;
DROP TABLE IF EXISTS projects;
"#;

pub fn migration() -> Migration {
    Migration::from_sql(ID, VERSION, "create projects", UP_SQL, DOWN_SQL)
}

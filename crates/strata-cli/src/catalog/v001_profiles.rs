//! v001 -- User profiles.

use strata_store::Migration;

pub const ID: &str = "001_profiles";
pub const VERSION: i64 = 1;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email        TEXT NOT NULL,
    display_name TEXT,
    role         TEXT NOT NULL DEFAULT 'member',
    created_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_email ON profiles(email);
"#;

const DOWN_SQL: &str = r#"
DROP INDEX IF EXISTS idx_profiles_email;
DROP TABLE IF EXISTS profiles;
"#;

pub fn migration() -> Migration {
    Migration::from_sql(ID, VERSION, "create profiles", UP_SQL, DOWN_SQL)
}

//! `strata create` -- new migration module templates.
//!
//! Files are named `v<NNN>_<slug>.rs`; the next number is one past the
//! highest `vNNN_` prefix already in the directory.  The generated module is
//! not registered automatically.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;

/// Write a new migration template into `dir` and return its path.
pub fn create_migration(dir: &Path, name: &str) -> Result<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        bail!("migration name {name:?} contains no letters or digits");
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create migrations directory {}", dir.display()))?;

    let version = next_version(dir)?;
    let module = format!("v{version:03}_{slug}");
    let path = dir.join(format!("{module}.rs"));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("refusing to overwrite {}", path.display()))?;
    file.write_all(template(version, &slug, name).as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), version, "created migration template");
    Ok(path)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

fn next_version(dir: &Path) -> Result<i64> {
    let mut highest = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let file_name = entry?.file_name();
        if let Some(version) = file_name.to_str().and_then(module_version) {
            highest = highest.max(version);
        }
    }
    Ok(highest + 1)
}

// "v012_add_budget.rs" -> 12
fn module_version(file_name: &str) -> Option<i64> {
    let stem = file_name.strip_suffix(".rs")?.strip_prefix('v')?;
    let (digits, _) = stem.split_once('_')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// Collapse control characters and runs of whitespace onto one line.
fn one_line(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn template(version: i64, slug: &str, name: &str) -> String {
    format!(
        "//! v{version:03} -- {title}.\n\
         //!\n\
         //! Created {created}.\n\
         \n\
         use strata_store::Migration;\n\
         \n\
         pub const ID: &str = \"{version:03}_{slug}\";\n\
         pub const VERSION: i64 = {version};\n\
         \n\
         const UP_SQL: &str = r#\"\n\
         -- Add your schema changes here\n\
         \"#;\n\
         \n\
         const DOWN_SQL: &str = r#\"\n\
         -- Add rollback statements here\n\
         \"#;\n\
         \n\
         pub fn migration() -> Migration {{\n    \
             Migration::from_sql(ID, VERSION, {name:?}, UP_SQL, DOWN_SQL)\n\
         }}\n",
        title = one_line(name),
        created = Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

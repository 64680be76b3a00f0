//! Application migration catalog.
//!
//! Every known migration is listed in [`build_registry`], which runs once at
//! process start before any command.  To add one, run `strata create <name>`,
//! declare the new module below and append its `migration()` to the list.

pub mod v001_profiles;
pub mod v002_projects;
pub mod v003_proposals;

use strata_store::{MigrationRegistry, RegistryError, StatusStore};

/// Build the registry with the bootstrap migration plus every application
/// migration, rejecting duplicate ids.
pub fn build_registry(status: StatusStore) -> Result<MigrationRegistry, RegistryError> {
    let mut registry = MigrationRegistry::new(status);

    for migration in [
        v001_profiles::migration(),
        v002_projects::migration(),
        v003_proposals::migration(),
    ] {
        registry.try_register(migration)?;
    }

    Ok(registry)
}

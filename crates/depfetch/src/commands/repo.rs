//! Repository commands

use super::CommandError;
use crate::config::Config;
use crate::registry::RegistryEntry;

/// Register a repository under `id`
pub fn add_repository(
    config: &Config,
    id: &str,
    url: &str,
    ivy_like: bool,
) -> Result<RegistryEntry, CommandError> {
    Ok(config.registry().add(id, url, ivy_like)?)
}

/// Every known repository
pub fn list_repositories(config: &Config) -> Result<Vec<RegistryEntry>, CommandError> {
    Ok(config.registry().list()?)
}

/// Replace the default list when `ids` is given; returns the default ids
pub fn set_default_repositories(
    config: &Config,
    ids: &[String],
    with_not_found: bool,
) -> Result<Vec<String>, CommandError> {
    let registry = config.registry();
    if !ids.is_empty() {
        registry.set_default(ids)?;
    }
    Ok(registry.default_ids(with_not_found)?)
}
